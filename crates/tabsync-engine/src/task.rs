//! The copy task surface exposed to the scheduler
//!
//! A [`CopyTask`] moves through `setup()` then `run()` or `compile()`. All
//! configuration and schema problems surface in `setup()`, so an invalid
//! task never touches data. `run()` executes the compiled pipeline; when a
//! statement writer is attached, the compiled statements are written to disk
//! first so every run leaves an audit trail. `compile()` only writes the
//! statements.

use std::sync::Arc;

use tracing::{debug, error, info};

use tabsync_common::properties::Parameters;
use tabsync_common::{Result, SyncError};

use crate::adapter::{ConnectionRegistry, DbAdapter};
use crate::compiler::{CompiledPipeline, QueryCompiler};
use crate::config::{validate, CopyConfig, RawCopyConfig};
use crate::ddl::ResolvedDdl;
use crate::executor::PipelineExecutor;
use crate::persister::{QueryPersister, StatementWriter};
use crate::plan::LoadPlan;

/// Task status reported to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Setup completed; the task can run.
    Ready,
    Success,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Ready => write!(f, "ready"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The result of one setup/run/compile invocation. Produced once and handed
/// upstream; a re-run produces a fresh outcome.
#[derive(Debug)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    /// The pipeline step that failed, when the failure happened inside the
    /// pipeline or during statement persistence.
    pub failed_step: Option<String>,
    pub error: Option<SyncError>,
}

impl TaskOutcome {
    pub fn ready() -> Self {
        Self {
            status: TaskStatus::Ready,
            failed_step: None,
            error: None,
        }
    }

    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            failed_step: None,
            error: None,
        }
    }

    pub fn failed(error: SyncError) -> Self {
        Self {
            status: TaskStatus::Failed,
            failed_step: error.step().map(String::from),
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Everything derived by a successful setup. Recomputed on every setup call,
/// never mutated in place.
struct TaskState {
    config: CopyConfig,
    plan: LoadPlan,
    pipeline: CompiledPipeline,
    ddl: ResolvedDdl,
    source: Arc<dyn DbAdapter>,
    destination: Arc<dyn DbAdapter>,
}

/// A table copy task: one source table into one destination table.
pub struct CopyTask {
    name: String,
    raw: RawCopyConfig,
    registry: ConnectionRegistry,
    writer: Option<Arc<dyn StatementWriter>>,
    state: Option<TaskState>,
}

impl CopyTask {
    pub fn new(raw: RawCopyConfig, registry: ConnectionRegistry) -> Self {
        Self {
            name: raw.name.clone(),
            raw,
            registry,
            writer: None,
            state: None,
        }
    }

    /// Attach a statement writer. `run()` then persists the compiled
    /// statements before executing, and `compile()` becomes available.
    pub fn with_statement_writer(mut self, writer: Arc<dyn StatementWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate configuration, resolve the DDL against the source schema,
    /// derive the load plan and compile the pipeline.
    pub async fn setup(&mut self, params: &Parameters) -> TaskOutcome {
        match self.try_setup(params).await {
            Ok(()) => {
                debug!(task = %self.name, "setup complete");
                TaskOutcome::ready()
            }
            Err(e) => {
                error!(task = %self.name, error = %e, "setup failed");
                TaskOutcome::failed(e)
            }
        }
    }

    async fn try_setup(&mut self, params: &Parameters) -> Result<()> {
        // Re-running setup recomputes everything from scratch.
        self.state = None;

        let config = validate(&self.raw, params, &self.registry.database_names())?;

        let source = self.registry.get(&config.source.db).ok_or_else(|| {
            SyncError::Internal(format!(
                "validated database '{}' missing from registry",
                config.source.db
            ))
        })?;
        let destination = self.registry.get(&config.destination.db).ok_or_else(|| {
            SyncError::Internal(format!(
                "validated database '{}' missing from registry",
                config.destination.db
            ))
        })?;

        let source_table = source
            .get_table(&config.source.table, config.source.schema.as_deref())
            .await?
            .ok_or_else(|| {
                SyncError::schema_mismatch(format!(
                    "source table '{}' does not exist on database '{}'",
                    config.source.qualified_name(),
                    config.source.db
                ))
            })?;

        let ddl = config.ddl.resolve_types(&source_table)?;

        let destination_exists = destination
            .get_table(&config.destination.table, config.destination.schema.as_deref())
            .await?
            .is_some();

        let plan = LoadPlan::derive(
            &config.destination,
            destination_exists,
            config
                .incremental
                .as_ref()
                .map(|i| i.incremental_key.as_str()),
            config.incremental.as_ref().map(|i| i.delete_key.as_str()),
        )?;

        debug!(
            task = %self.name,
            strategy = %plan.strategy,
            load_target = %plan.load_target(),
            "load plan derived"
        );

        let pipeline = QueryCompiler::new(&plan, &config.source, &ddl, config.incremental.as_ref())
            .compile(destination.as_ref())?;

        self.state = Some(TaskState {
            config,
            plan,
            pipeline,
            ddl,
            source,
            destination,
        });

        Ok(())
    }

    /// Execute the compiled pipeline.
    pub async fn run(&self) -> TaskOutcome {
        let Some(state) = &self.state else {
            return TaskOutcome::failed(SyncError::Internal(
                "run() called before a successful setup()".to_string(),
            ));
        };

        // Audit trail: the statements about to run, on disk first.
        if let Some(writer) = &self.writer {
            debug!(task = %self.name, "writing compiled queries");
            if let Err(e) = QueryPersister::new(writer.as_ref()).persist(&self.name, &state.pipeline)
            {
                error!(task = %self.name, error = %e, "failed to write compiled queries");
                return TaskOutcome::failed(e);
            }
        }

        let executor = PipelineExecutor::new(
            &self.name,
            state.source.as_ref(),
            state.destination.as_ref(),
            &state.plan,
            &state.pipeline,
            &state.ddl,
        );

        match executor.run().await {
            Ok(summary) => {
                info!(
                    task = %self.name,
                    rows = summary.rows_loaded,
                    destination = %state.config.destination.qualified_name(),
                    "copy complete"
                );
                TaskOutcome::success()
            }
            Err(e) => {
                if let Some(statement) = e.statement() {
                    debug!(task = %self.name, statement = %statement, "failing statement");
                }
                error!(task = %self.name, error = %e, "run failed");
                TaskOutcome::failed(e)
            }
        }
    }

    /// Write the compiled statements without executing anything.
    pub async fn compile(&self) -> TaskOutcome {
        let Some(state) = &self.state else {
            return TaskOutcome::failed(SyncError::Internal(
                "compile() called before a successful setup()".to_string(),
            ));
        };

        let Some(writer) = &self.writer else {
            return TaskOutcome::failed(SyncError::config(
                "compile mode requires a statement writer",
            ));
        };

        match QueryPersister::new(writer.as_ref()).persist(&self.name, &state.pipeline) {
            Ok(()) => {
                info!(task = %self.name, "queries compiled");
                TaskOutcome::success()
            }
            Err(e) => {
                error!(task = %self.name, error = %e, "compile failed");
                TaskOutcome::failed(e)
            }
        }
    }
}
