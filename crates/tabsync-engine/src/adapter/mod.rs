//! Database adapter interface
//!
//! The engine never talks to a driver directly. Everything it needs from a
//! database is expressed by [`DbAdapter`]: running queries, loading rows,
//! reflecting tables, and building the dialect SQL for table creation, move
//! and merge. One adapter instance corresponds to one named connection in
//! the project configuration; the [`ConnectionRegistry`] maps names to
//! adapters.
//!
//! Compiled statements use the canonical `:watermark` placeholder for the
//! single bound parameter a pipeline can carry. Each adapter maps it to its
//! driver's placeholder syntax; when a statement references `:watermark` but
//! no value is supplied, the adapter substitutes the SQL literal `NULL`.

pub mod postgres;

pub use postgres::PostgresAdapter;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tabsync_common::Result;

use crate::ddl::ResolvedDdl;

/// The canonical bound-parameter placeholder in compiled statements.
pub const WATERMARK_PARAM: &str = ":watermark";

/// A canonical scalar value moving through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// One extracted row, values ordered per the DDL column list.
pub type Row = Vec<SqlValue>;

/// A column as reported by table reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedColumn {
    pub name: String,
    pub data_type: String,
}

/// A reflected physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<ReflectedColumn>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ReflectedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn qualified_name(&self) -> String {
        qualified(&self.table, self.schema.as_deref())
    }
}

/// Schema-qualified table name for SQL text.
pub fn qualified(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, table),
        None => table.to_string(),
    }
}

/// Capabilities the engine requires from a database connection.
///
/// Query execution and row loading are async; the statement builders are
/// pure and produce dialect SQL text so that compiled pipelines can be
/// persisted without touching the database.
#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Connection name, for logging.
    fn name(&self) -> &str;

    /// Run a query and return all rows. `watermark` is bound in place of
    /// the `:watermark` placeholder when present.
    async fn select(&self, sql: &str, watermark: Option<&SqlValue>) -> Result<Vec<Row>>;

    /// Run one or more statements that return no rows.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Insert rows into a table. Values arrive in `columns` order. Returns
    /// the number of rows written.
    async fn load_rows(
        &self,
        table: &str,
        schema: Option<&str>,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64>;

    /// Reflect a table, returning `None` when it does not exist.
    async fn get_table(&self, table: &str, schema: Option<&str>)
        -> Result<Option<TableDescriptor>>;

    /// SQL to create `table` with the given columns. With `replace`, any
    /// pre-existing table of the same name is dropped first.
    fn create_table_sql(
        &self,
        table: &str,
        schema: Option<&str>,
        ddl: &ResolvedDdl,
        replace: bool,
    ) -> String {
        let target = qualified(table, schema);
        let columns = ddl
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");

        if replace {
            format!(
                "DROP TABLE IF EXISTS {target};\nCREATE TABLE {target} ({columns});",
                target = target,
                columns = columns
            )
        } else {
            format!("CREATE TABLE {} ({});", target, columns)
        }
    }

    /// SQL to move `from` into the place of `to`, replacing it.
    fn move_table_sql(
        &self,
        from: &str,
        from_schema: Option<&str>,
        to: &str,
        to_schema: Option<&str>,
        _ddl: &ResolvedDdl,
    ) -> String {
        format!(
            "DROP TABLE IF EXISTS {to_q};\nALTER TABLE {from_q} RENAME TO {to};",
            to_q = qualified(to, to_schema),
            from_q = qualified(from, from_schema),
            to = to
        )
    }

    /// SQL to merge `from` into `to`: rows matching on `delete_key` are
    /// replaced, the rest inserted. The insert names its columns on both
    /// sides, since a pre-existing destination may store them in a different
    /// physical order. The staging table is dropped afterwards.
    fn merge_tables_sql(
        &self,
        from: &str,
        from_schema: Option<&str>,
        to: &str,
        to_schema: Option<&str>,
        delete_key: &str,
        ddl: &ResolvedDdl,
    ) -> String {
        let from_q = qualified(from, from_schema);
        let to_q = qualified(to, to_schema);
        let columns = ddl.column_list();
        format!(
            "DELETE FROM {to_q} WHERE {key} IN (SELECT {key} FROM {from_q});\n\
             INSERT INTO {to_q} ({columns}) SELECT {columns} FROM {from_q};\n\
             DROP TABLE {from_q};",
            to_q = to_q,
            from_q = from_q,
            key = delete_key,
            columns = columns
        )
    }
}

/// Named database connections available to tasks.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    adapters: HashMap<String, Arc<dyn DbAdapter>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, adapter: Arc<dyn DbAdapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DbAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn database_names(&self) -> HashSet<String> {
        self.adapters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified("orders", None), "orders");
        assert_eq!(qualified("orders", Some("analytics")), "analytics.orders");
    }

    #[test]
    fn test_table_descriptor_column_lookup() {
        let descriptor = TableDescriptor {
            table: "orders".to_string(),
            schema: Some("analytics".to_string()),
            columns: vec![ReflectedColumn {
                name: "id".to_string(),
                data_type: "bigint".to_string(),
            }],
        };

        assert!(descriptor.column("id").is_some());
        assert!(descriptor.column("amount").is_none());
        assert_eq!(descriptor.qualified_name(), "analytics.orders");
    }

    #[test]
    fn test_sql_value_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Int(0).is_null());
    }
}
