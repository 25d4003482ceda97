//! Load strategy selection
//!
//! The physical load plan is derived, never configured. The decision table:
//!
//! | destination exists | incremental keys | strategy | load target   |
//! |--------------------|------------------|----------|---------------|
//! | no                 | any              | Full     | final table   |
//! | yes                | absent           | Replace  | staging table |
//! | yes                | present          | Merge    | staging table |
//!
//! Validation guarantees the incremental/delete keys are both set or both
//! absent; a mixed pair reaching this module is a defect in tabsync and
//! fails with an internal invariant error rather than picking a default.

use tabsync_common::{Result, SyncError};

use crate::adapter::qualified;
use crate::config::TableRef;

/// Prefix for staging table names in the destination schema.
pub const STAGING_PREFIX: &str = "tabsync_tmp_";

/// How rows physically land in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Destination does not exist: create it and load directly.
    Full,
    /// Destination exists, no incremental keys: load a staging table, then
    /// move it into place.
    Replace,
    /// Destination exists with incremental keys: load the delta into a
    /// staging table, then merge on the delete key.
    Merge,
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStrategy::Full => write!(f, "full"),
            LoadStrategy::Replace => write!(f, "replace"),
            LoadStrategy::Merge => write!(f, "merge"),
        }
    }
}

/// The derived physical load plan. Recomputed per task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub strategy: LoadStrategy,
    pub load_table: String,
    pub load_schema: Option<String>,
    pub final_table: String,
    pub final_schema: Option<String>,
}

impl LoadPlan {
    /// Derive the plan from destination existence and key configuration.
    pub fn derive(
        destination: &TableRef,
        destination_exists: bool,
        incremental_key: Option<&str>,
        delete_key: Option<&str>,
    ) -> Result<Self> {
        if incremental_key.is_some() != delete_key.is_some() {
            return Err(SyncError::Internal(format!(
                "strategy selection reached a mixed key pair (incremental_key: {:?}, delete_key: {:?}); \
                 configuration validation should have rejected this",
                incremental_key, delete_key
            )));
        }

        let strategy = match (destination_exists, incremental_key.is_some()) {
            (false, _) => LoadStrategy::Full,
            (true, false) => LoadStrategy::Replace,
            (true, true) => LoadStrategy::Merge,
        };

        let (load_table, load_schema) = match strategy {
            LoadStrategy::Full => (destination.table.clone(), destination.schema.clone()),
            LoadStrategy::Replace | LoadStrategy::Merge => (
                format!("{}{}", STAGING_PREFIX, destination.table),
                destination.schema.clone(),
            ),
        };

        Ok(Self {
            strategy,
            load_table,
            load_schema,
            final_table: destination.table.clone(),
            final_schema: destination.schema.clone(),
        })
    }

    /// Does the plan land rows in a staging table first?
    pub fn uses_staging(&self) -> bool {
        !matches!(self.strategy, LoadStrategy::Full)
    }

    /// Qualified name of the table rows are loaded into.
    pub fn load_target(&self) -> String {
        qualified(&self.load_table, self.load_schema.as_deref())
    }

    /// Qualified name of the final destination table.
    pub fn final_target(&self) -> String {
        qualified(&self.final_table, self.final_schema.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> TableRef {
        TableRef {
            db: "analytics".to_string(),
            schema: Some("public".to_string()),
            table: "orders".to_string(),
        }
    }

    #[test]
    fn test_missing_destination_selects_full() {
        let plan = LoadPlan::derive(&destination(), false, None, None).unwrap();

        assert_eq!(plan.strategy, LoadStrategy::Full);
        assert_eq!(plan.load_table, plan.final_table);
        assert_eq!(plan.load_schema, plan.final_schema);
        assert!(!plan.uses_staging());
    }

    #[test]
    fn test_missing_destination_with_keys_still_full() {
        let plan = LoadPlan::derive(&destination(), false, Some("updated_at"), Some("id")).unwrap();
        assert_eq!(plan.strategy, LoadStrategy::Full);
    }

    #[test]
    fn test_existing_destination_without_keys_selects_replace() {
        let plan = LoadPlan::derive(&destination(), true, None, None).unwrap();

        assert_eq!(plan.strategy, LoadStrategy::Replace);
        assert_eq!(plan.load_table, "tabsync_tmp_orders");
        assert_ne!(plan.load_table, plan.final_table);
        assert_eq!(plan.load_schema.as_deref(), Some("public"));
        assert!(plan.uses_staging());
    }

    #[test]
    fn test_existing_destination_with_keys_selects_merge() {
        let plan = LoadPlan::derive(&destination(), true, Some("updated_at"), Some("id")).unwrap();

        assert_eq!(plan.strategy, LoadStrategy::Merge);
        assert_eq!(plan.load_target(), "public.tabsync_tmp_orders");
        assert_eq!(plan.final_target(), "public.orders");
    }

    #[test]
    fn test_mixed_key_pair_is_internal_error() {
        let err = LoadPlan::derive(&destination(), true, Some("updated_at"), None).unwrap_err();
        assert!(matches!(err, SyncError::Internal(_)));

        let err = LoadPlan::derive(&destination(), false, None, Some("id")).unwrap_err();
        assert!(matches!(err, SyncError::Internal(_)));
    }
}
