//! Tabsync Common Library
//!
//! Shared types, utilities, and error handling for the tabsync workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all tabsync workspace
//! members:
//!
//! - **Error Handling**: the error taxonomy shared by the engine and the CLI
//! - **Logging**: tracing-based logging initialization
//! - **Properties**: template resolution for task-parameterized values
//!
//! # Example
//!
//! ```no_run
//! use tabsync_common::{Result, SyncError};
//! use tabsync_common::properties::Parameters;
//!
//! fn resolve_table(params: &Parameters) -> Result<String> {
//!     params.resolve("orders_{{ env }}")
//! }
//! ```

pub mod error;
pub mod logging;
pub mod properties;

// Re-export commonly used types
pub use error::{Result, SyncError};
