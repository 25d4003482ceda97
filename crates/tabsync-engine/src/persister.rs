//! Compile-mode statement persistence
//!
//! In compile mode a task writes its statements to durable storage instead
//! of executing them, for dry-run auditing. Statements are written in fixed
//! step order (watermark, extract, stage, finish); the first write failure
//! aborts the whole persist and reports the step that failed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use tabsync_common::{Result, SyncError};

use crate::compiler::{CompiledPipeline, StepName};

/// Durable sink for compiled statements, keyed by task and step.
pub trait StatementWriter: Send + Sync {
    fn write_statement(&self, task: &str, step: StepName, sql: &str) -> Result<()>;
}

/// Writes statements to `<dir>/<task>_<step>.sql`.
pub struct FileStatementWriter {
    dir: PathBuf,
}

impl FileStatementWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, task: &str, step: StepName) -> PathBuf {
        self.dir.join(format!("{}_{}.sql", task, step.as_str()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StatementWriter for FileStatementWriter {
    fn write_statement(&self, task: &str, step: StepName, sql: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(task, step), sql)?;
        Ok(())
    }
}

/// Persists every present statement of a pipeline, never executing any.
pub struct QueryPersister<'a> {
    writer: &'a dyn StatementWriter,
}

impl<'a> QueryPersister<'a> {
    pub fn new(writer: &'a dyn StatementWriter) -> Self {
        Self { writer }
    }

    pub fn persist(&self, task: &str, pipeline: &CompiledPipeline) -> Result<()> {
        for (step, sql) in pipeline.steps() {
            self.writer
                .write_statement(task, step, sql)
                .map_err(|e| SyncError::Persistence {
                    step: step.as_str().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(task = %task, step = %step, "persisted statement");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writer_paths() {
        let writer = FileStatementWriter::new("/tmp/queries");
        assert_eq!(
            writer.path_for("orders_copy", StepName::Extract),
            PathBuf::from("/tmp/queries/orders_copy_extract.sql")
        );
    }
}
