//! Shared test fixtures: a scriptable in-memory database adapter and a
//! recording statement writer.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tabsync_common::{Result, SyncError};
use tabsync_engine::adapter::{
    qualified, ConnectionRegistry, DbAdapter, ReflectedColumn, Row, SqlValue, TableDescriptor,
};
use tabsync_engine::compiler::StepName;
use tabsync_engine::config::RawCopyConfig;
use tabsync_engine::persister::StatementWriter;

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Select {
        sql: String,
        watermark: Option<SqlValue>,
    },
    Execute(String),
    LoadRows {
        table: String,
        schema: Option<String>,
        rows: usize,
    },
    GetTable(String),
}

/// In-memory adapter. Reflection is served from a fixed table map; select
/// results are scripted as a queue, popped per call. A failure can be
/// injected by SQL substring (or the `"load_rows"` marker).
pub struct MockAdapter {
    name: String,
    tables: HashMap<String, TableDescriptor>,
    select_results: Mutex<VecDeque<Vec<Row>>>,
    fail_on: Option<String>,
    pub calls: Mutex<Vec<Call>>,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: HashMap::new(),
            select_results: Mutex::new(VecDeque::new()),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_table(mut self, table: &str, schema: Option<&str>, columns: &[(&str, &str)]) -> Self {
        let descriptor = TableDescriptor {
            table: table.to_string(),
            schema: schema.map(String::from),
            columns: columns
                .iter()
                .map(|(name, data_type)| ReflectedColumn {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                })
                .collect(),
        };
        self.tables.insert(qualified(table, schema), descriptor);
        self
    }

    pub fn with_select_result(self, rows: Vec<Row>) -> Self {
        self.select_results.lock().unwrap().push_back(rows);
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that would touch data: everything except reflection.
    pub fn data_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::GetTable(_)))
            .collect()
    }

    fn check_failure(&self, context: &str) -> Result<()> {
        if let Some(marker) = &self.fail_on {
            if context.contains(marker.as_str()) {
                return Err(SyncError::database(format!(
                    "injected failure on '{}'",
                    marker
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DbAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn select(&self, sql: &str, watermark: Option<&SqlValue>) -> Result<Vec<Row>> {
        self.calls.lock().unwrap().push(Call::Select {
            sql: sql.to_string(),
            watermark: watermark.cloned(),
        });
        self.check_failure(sql)?;
        Ok(self
            .select_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Execute(sql.to_string()));
        self.check_failure(sql)
    }

    async fn load_rows(
        &self,
        table: &str,
        schema: Option<&str>,
        _columns: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        self.calls.lock().unwrap().push(Call::LoadRows {
            table: table.to_string(),
            schema: schema.map(String::from),
            rows: rows.len(),
        });
        self.check_failure("load_rows")?;
        Ok(rows.len() as u64)
    }

    async fn get_table(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Option<TableDescriptor>> {
        let key = qualified(table, schema);
        self.calls.lock().unwrap().push(Call::GetTable(key.clone()));
        Ok(self.tables.get(&key).cloned())
    }
}

/// Statement writer that records what it is asked to write. A failure can be
/// injected per step.
#[derive(Default)]
pub struct RecordingWriter {
    pub written: Mutex<Vec<(String, StepName, String)>>,
    pub fail_step: Option<StepName>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(step: StepName) -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail_step: Some(step),
        }
    }

    pub fn steps(&self) -> Vec<StepName> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(_, step, _)| *step)
            .collect()
    }
}

impl StatementWriter for RecordingWriter {
    fn write_statement(&self, task: &str, step: StepName, sql: &str) -> Result<()> {
        if self.fail_step == Some(step) {
            return Err(SyncError::database("injected write failure".to_string()));
        }
        self.written
            .lock()
            .unwrap()
            .push((task.to_string(), step, sql.to_string()));
        Ok(())
    }
}

/// A registry with both mocks registered under their connection names.
pub fn registry(source: &Arc<MockAdapter>, destination: &Arc<MockAdapter>) -> ConnectionRegistry {
    let mut registry = ConnectionRegistry::new();
    registry.insert(source.name().to_string(), source.clone() as Arc<dyn DbAdapter>);
    registry.insert(
        destination.name().to_string(),
        destination.clone() as Arc<dyn DbAdapter>,
    );
    registry
}

/// The orders fixture used throughout: id, amount, updated_at.
pub fn orders_config(incremental: bool) -> RawCopyConfig {
    let mut json = serde_json::json!({
        "name": "orders_copy",
        "source": {"db": "warehouse", "table": "orders"},
        "destination": {"db": "analytics", "table": "orders"},
        "columns": [
            {"name": "id"},
            {"name": "amount"},
            {"name": "updated_at"}
        ]
    });
    if incremental {
        json["incremental_key"] = serde_json::json!("updated_at");
        json["delete_key"] = serde_json::json!("id");
    }
    serde_json::from_value(json).unwrap()
}

pub const ORDERS_COLUMNS: &[(&str, &str)] = &[
    ("id", "bigint"),
    ("amount", "numeric"),
    ("updated_at", "timestamptz"),
];

/// A couple of extracted order rows.
pub fn order_rows() -> Vec<Row> {
    vec![
        vec![
            SqlValue::Int(1),
            SqlValue::Float(9.5),
            SqlValue::Text("2026-01-01T00:00:00Z".to_string()),
        ],
        vec![SqlValue::Int(2), SqlValue::Float(12.0), SqlValue::Null],
    ]
}
