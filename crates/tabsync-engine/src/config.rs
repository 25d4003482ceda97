//! Task configuration validation
//!
//! Raw task configuration arrives as loosely-shaped data (deserialized JSON).
//! Validation runs once at setup and produces the immutable, fully-typed
//! [`CopyConfig`]; nothing downstream ever branches on a half-validated
//! option again. Property templates (`{{ param }}`) in database, schema and
//! table names are resolved here.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use tabsync_common::properties::Parameters;
use tabsync_common::{Result, SyncError};

use crate::adapter::qualified;
use crate::ddl::{ColumnSpec, DdlSpec};

/// A physical table in a named database connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub db: String,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    /// Schema-qualified name for SQL text and messages.
    pub fn qualified_name(&self) -> String {
        qualified(&self.table, self.schema.as_deref())
    }
}

/// Incremental load keys. Both are always present together; the
/// both-or-neither rule is enforced by validation, so holding this struct is
/// proof the pair is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalConfig {
    /// Monotonically comparable column identifying new/changed source rows.
    pub incremental_key: String,
    /// Column used to match destination rows for replacement during merge.
    pub delete_key: String,
}

/// A table reference as written in task configuration, before validation.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTableRef {
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Anything else the user wrote; rejected by validation.
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

/// Raw copy task configuration, as deserialized from the project file.
/// Unknown top-level keys fail deserialization; a typo'd key must not
/// silently change the load strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCopyConfig {
    pub name: String,
    pub source: RawTableRef,
    pub destination: RawTableRef,
    #[serde(default)]
    pub columns: Option<Vec<ColumnSpec>>,
    #[serde(default)]
    pub incremental_key: Option<String>,
    #[serde(default)]
    pub delete_key: Option<String>,
}

/// Validated copy task configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub name: String,
    pub source: TableRef,
    pub destination: TableRef,
    pub ddl: DdlSpec,
    pub incremental: Option<IncrementalConfig>,
}

/// Validate a raw task configuration against the set of configured database
/// connections, resolving property templates along the way.
pub fn validate(
    raw: &RawCopyConfig,
    params: &Parameters,
    known_databases: &HashSet<String>,
) -> Result<CopyConfig> {
    if raw.name.trim().is_empty() {
        return Err(SyncError::config("task name cannot be empty"));
    }

    let source = validate_table_ref("source", &raw.source, params, known_databases)?;
    let destination = validate_table_ref("destination", &raw.destination, params, known_databases)?;

    let columns = raw.columns.clone().ok_or_else(|| {
        SyncError::config(format!(
            "task '{}': DDL is required for copy tasks; declare \"columns\"",
            raw.name
        ))
    })?;
    let ddl = DdlSpec::new(columns)?;

    let incremental = validate_incremental(raw, &ddl)?;

    Ok(CopyConfig {
        name: raw.name.clone(),
        source,
        destination,
        ddl,
        incremental,
    })
}

fn validate_table_ref(
    role: &str,
    raw: &RawTableRef,
    params: &Parameters,
    known_databases: &HashSet<String>,
) -> Result<TableRef> {
    if !raw.extra.is_empty() {
        let mut keys: Vec<_> = raw.extra.keys().cloned().collect();
        keys.sort();
        return Err(SyncError::config(format!(
            "{} requires \"db\" and \"table\" fields, optional \"schema\"; unknown fields: {}",
            role,
            keys.join(", ")
        )));
    }

    let db = match raw.db.as_deref() {
        Some(db) if !db.is_empty() => params.resolve(db)?,
        _ => {
            return Err(SyncError::config(format!(
                "{} requires \"db\" and \"table\" fields, optional \"schema\"",
                role
            )))
        }
    };

    let table = match raw.table.as_deref() {
        Some(table) if !table.is_empty() => params.resolve(table)?,
        _ => {
            return Err(SyncError::config(format!(
                "{} requires \"db\" and \"table\" fields, optional \"schema\"",
                role
            )))
        }
    };

    let schema = match raw.schema.as_deref() {
        Some(schema) => Some(params.resolve(schema)?),
        None => None,
    };

    if !known_databases.contains(&db) {
        return Err(SyncError::config(format!(
            "'{}' is not a configured database connection (in {})",
            db, role
        )));
    }

    Ok(TableRef { db, schema, table })
}

fn validate_incremental(raw: &RawCopyConfig, ddl: &DdlSpec) -> Result<Option<IncrementalConfig>> {
    match (&raw.incremental_key, &raw.delete_key) {
        (None, None) => Ok(None),
        (Some(incremental_key), Some(delete_key)) => {
            for key in [incremental_key, delete_key] {
                if !ddl.has_column(key) {
                    return Err(SyncError::config(format!(
                        "key column '{}' is not declared in the DDL",
                        key
                    )));
                }
            }
            Ok(Some(IncrementalConfig {
                incremental_key: incremental_key.clone(),
                delete_key: delete_key.clone(),
            }))
        }
        _ => Err(SyncError::config(
            "incremental copy requires both \"delete_key\" and \"incremental_key\"",
        )),
    }
}
