//! Destination DDL specification and column type resolution
//!
//! A copy task declares the destination's column set up front. Column types
//! may be omitted, in which case they are filled in from the source table's
//! reflected schema during setup. Resolution never mutates the declared spec;
//! it produces a new [`ResolvedDdl`] in which every column carries a type, so
//! downstream code (query compilation, table creation) never has to branch on
//! an optional type again.

use serde::Deserialize;

use tabsync_common::{Result, SyncError};

use crate::adapter::TableDescriptor;

/// A single declared destination column. The type is optional at
/// configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
}

/// The declared destination column set, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlSpec {
    columns: Vec<ColumnSpec>,
}

impl DdlSpec {
    /// Build a spec from declared columns. Fails on an empty column list or
    /// a duplicate column name.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SyncError::config("DDL must declare at least one column"));
        }

        for (i, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(SyncError::config("DDL column name cannot be empty"));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SyncError::config(format!(
                    "DDL declares column '{}' more than once",
                    column.name
                )));
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Ordered list of declared column names.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Does the spec name this column?
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Fill in any omitted column types from the source table's reflected
    /// schema, producing a new fully-typed spec.
    ///
    /// Every declared column must exist verbatim on the source; a column the
    /// source does not have is a schema mismatch. Declared types always win
    /// over reflected ones.
    pub fn resolve_types(&self, source: &TableDescriptor) -> Result<ResolvedDdl> {
        let mut resolved = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let reflected = source.column(&column.name).ok_or_else(|| {
                SyncError::schema_mismatch(format!(
                    "column '{}' declared in DDL does not exist on source table '{}'",
                    column.name,
                    source.qualified_name()
                ))
            })?;

            let data_type = match &column.data_type {
                Some(declared) => declared.clone(),
                None => reflected.data_type.clone(),
            };

            resolved.push(ResolvedColumn {
                name: column.name.clone(),
                data_type,
            });
        }

        Ok(ResolvedDdl { columns: resolved })
    }
}

/// A destination column with its type fully determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub name: String,
    pub data_type: String,
}

/// A fully-typed destination column set. Immutable once produced by
/// [`DdlSpec::resolve_types`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDdl {
    columns: Vec<ResolvedColumn>,
}

impl ResolvedDdl {
    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    /// Ordered list of column names.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Comma-separated column list for SELECT / INSERT statements.
    pub fn column_list(&self) -> String {
        self.column_names().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ReflectedColumn;

    fn source_table() -> TableDescriptor {
        TableDescriptor {
            table: "orders".to_string(),
            schema: None,
            columns: vec![
                ReflectedColumn {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                },
                ReflectedColumn {
                    name: "name".to_string(),
                    data_type: "text".to_string(),
                },
            ],
        }
    }

    fn spec(columns: &[(&str, Option<&str>)]) -> DdlSpec {
        DdlSpec::new(
            columns
                .iter()
                .map(|(name, data_type)| ColumnSpec {
                    name: name.to_string(),
                    data_type: data_type.map(String::from),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_ddl_rejected() {
        let err = DdlSpec::new(vec![]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = DdlSpec::new(vec![
            ColumnSpec {
                name: "id".to_string(),
                data_type: None,
            },
            ColumnSpec {
                name: "id".to_string(),
                data_type: Some("bigint".to_string()),
            },
        ])
        .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_resolution_fills_missing_types_from_source() {
        let ddl = spec(&[("id", None), ("name", None)]);
        let resolved = ddl.resolve_types(&source_table()).unwrap();

        assert_eq!(resolved.columns()[0].data_type, "integer");
        assert_eq!(resolved.columns()[1].data_type, "text");
    }

    #[test]
    fn test_resolution_keeps_declared_types() {
        let ddl = spec(&[("id", Some("bigint")), ("name", None)]);
        let resolved = ddl.resolve_types(&source_table()).unwrap();

        assert_eq!(resolved.columns()[0].data_type, "bigint");
        assert_eq!(resolved.columns()[1].data_type, "text");
    }

    #[test]
    fn test_missing_source_column_is_schema_mismatch() {
        let ddl = spec(&[("id", None), ("amount", None)]);
        let err = ddl.resolve_types(&source_table()).unwrap_err();

        assert!(matches!(err, SyncError::SchemaMismatch(_)));
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_column_order_preserved() {
        let ddl = spec(&[("name", None), ("id", None)]);
        let resolved = ddl.resolve_types(&source_table()).unwrap();

        assert_eq!(resolved.column_list(), "name, id");
    }
}
