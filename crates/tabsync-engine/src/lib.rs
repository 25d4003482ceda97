//! Tabsync Engine
//!
//! Copies rows from a source table into a destination table under one of
//! three derived load strategies:
//!
//! - **Full**: the destination does not exist; create it and load directly.
//! - **Replace**: the destination exists and the copy is not incremental;
//!   load a staging table and move it into place.
//! - **Merge**: the destination exists and incremental/delete keys are
//!   configured; extract the delta above the destination's watermark, stage
//!   it, and merge on the delete key.
//!
//! Each task compiles a four-step pipeline (watermark, extract, stage,
//! finish) and either executes it or persists the statements for auditing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabsync_common::properties::Parameters;
//! use tabsync_engine::adapter::{ConnectionRegistry, PostgresAdapter};
//! use tabsync_engine::config::RawCopyConfig;
//! use tabsync_engine::task::CopyTask;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = ConnectionRegistry::new();
//!     registry.insert(
//!         "warehouse",
//!         Arc::new(PostgresAdapter::connect("warehouse", "postgres://localhost/wh", 5).await?),
//!     );
//!     registry.insert(
//!         "analytics",
//!         Arc::new(PostgresAdapter::connect("analytics", "postgres://localhost/an", 5).await?),
//!     );
//!
//!     let raw: RawCopyConfig = serde_json::from_str(
//!         r#"{
//!             "name": "orders_copy",
//!             "source": {"db": "warehouse", "table": "orders"},
//!             "destination": {"db": "analytics", "table": "orders"},
//!             "columns": [{"name": "id"}, {"name": "amount"}, {"name": "updated_at"}],
//!             "incremental_key": "updated_at",
//!             "delete_key": "id"
//!         }"#,
//!     )?;
//!
//!     let mut task = CopyTask::new(raw, registry);
//!     task.setup(&Parameters::new()).await;
//!     task.run().await;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod compiler;
pub mod config;
pub mod ddl;
pub mod executor;
pub mod persister;
pub mod plan;
pub mod task;

// Re-export the main entry points
pub use task::{CopyTask, TaskOutcome, TaskStatus};
