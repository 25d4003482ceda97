//! Error types for tabsync
//!
//! One enum covers the whole task lifecycle: configuration and schema errors
//! surface during setup, execution and persistence errors during run/compile.
//! Execution and persistence variants carry the name of the pipeline step
//! that failed so the scheduler can report exactly where a task died.

use thiserror::Error;

/// Result type alias for tabsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for tabsync
#[derive(Error, Debug)]
pub enum SyncError {
    /// Malformed or incomplete task configuration. Raised during setup,
    /// before any plan is built.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source table absent, or its columns do not match the requested DDL
    /// column set. Raised during setup.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A pipeline step failed at run time. `statement` is present for every
    /// step except the row-loading call, which has no statement text.
    #[error("Pipeline step '{step}' failed: {reason}")]
    Execution {
        step: String,
        statement: Option<String>,
        reason: String,
    },

    /// Failed to write a compiled statement to durable storage.
    #[error("Failed to persist statement for step '{step}': {reason}")]
    Persistence { step: String, reason: String },

    /// A branch that validation should have made unreachable was hit.
    /// Signals a defect in tabsync, not a user error.
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// The pipeline step this error is tagged with, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Execution { step, .. } | Self::Persistence { step, .. } => Some(step),
            _ => None,
        }
    }

    /// The statement text attached to an execution error, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Execution { statement, .. } => statement.as_deref(),
            _ => None,
        }
    }
}
