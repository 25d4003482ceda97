//! Pipeline execution
//!
//! Runs the compiled statements strictly in order: watermark, extract,
//! stage, row load, finish. Each sub-step blocks on the previous one; the
//! first failure aborts the run and is tagged with the step name and, for
//! every step but the row load, the statement text.
//!
//! An empty extraction short-circuits to success before any staging side
//! effect. There is no compensating rollback: if finish fails after staging,
//! the staging table stays behind and its name is surfaced in the failure.

use tracing::{debug, error, info};

use tabsync_common::{Result, SyncError};

use crate::adapter::{DbAdapter, SqlValue};
use crate::compiler::{CompiledPipeline, StepName};
use crate::ddl::ResolvedDdl;
use crate::plan::LoadPlan;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Rows written to the load target. Zero means the extraction was empty
    /// and the stage/finish steps were skipped.
    pub rows_loaded: u64,
    /// The watermark value obtained from the destination, when the pipeline
    /// had a watermark step and the destination held a non-null value.
    pub watermark: Option<SqlValue>,
}

/// Executes one compiled pipeline against the source and destination
/// adapters.
pub struct PipelineExecutor<'a> {
    task: &'a str,
    source: &'a dyn DbAdapter,
    destination: &'a dyn DbAdapter,
    plan: &'a LoadPlan,
    pipeline: &'a CompiledPipeline,
    ddl: &'a ResolvedDdl,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(
        task: &'a str,
        source: &'a dyn DbAdapter,
        destination: &'a dyn DbAdapter,
        plan: &'a LoadPlan,
        pipeline: &'a CompiledPipeline,
        ddl: &'a ResolvedDdl,
    ) -> Self {
        Self {
            task,
            source,
            destination,
            plan,
            pipeline,
            ddl,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let watermark = self.query_watermark().await?;

        let rows = self.extract(watermark.as_ref()).await?;
        if rows.is_empty() {
            debug!(task = %self.task, "nothing to load");
            return Ok(RunSummary {
                rows_loaded: 0,
                watermark,
            });
        }

        if let Some(sql) = self.pipeline.stage() {
            debug!(task = %self.task, target = %self.plan.load_target(), "creating load table");
            self.destination
                .execute(sql)
                .await
                .map_err(|e| step_error(StepName::Stage, Some(sql), e))?;
        }

        let columns = self.ddl.column_names();
        let rows_loaded = self
            .destination
            .load_rows(
                &self.plan.load_table,
                self.plan.load_schema.as_deref(),
                &columns,
                &rows,
            )
            .await
            .map_err(|e| step_error(StepName::LoadRows, None, e))?;

        if let Some(sql) = self.pipeline.finish() {
            debug!(task = %self.task, target = %self.plan.final_target(), "finishing load");
            self.destination.execute(sql).await.map_err(|e| {
                // Partial state the operator has to know about: rows are
                // staged but never reached the final table.
                error!(
                    task = %self.task,
                    staging_table = %self.plan.load_target(),
                    "finish failed; staging table left in place"
                );
                let base = step_error(StepName::Finish, Some(sql), e);
                match base {
                    SyncError::Execution {
                        step,
                        statement,
                        reason,
                    } => SyncError::Execution {
                        step,
                        statement,
                        reason: format!(
                            "{}; staging table {} left in place",
                            reason,
                            self.plan.load_target()
                        ),
                    },
                    other => other,
                }
            })?;
        }

        info!(
            task = %self.task,
            strategy = %self.plan.strategy,
            rows = rows_loaded,
            "pipeline complete"
        );

        Ok(RunSummary {
            rows_loaded,
            watermark,
        })
    }

    /// Step 1: the destination's current watermark, when the pipeline has
    /// one. An empty result or a null value means "no watermark yet".
    async fn query_watermark(&self) -> Result<Option<SqlValue>> {
        let Some(sql) = self.pipeline.watermark() else {
            return Ok(None);
        };

        debug!(task = %self.task, "querying watermark");
        let rows = self
            .destination
            .select(sql, None)
            .await
            .map_err(|e| step_error(StepName::Watermark, Some(sql), e))?;

        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .filter(|v| !v.is_null());

        if let Some(value) = &value {
            debug!(task = %self.task, watermark = %value, "watermark obtained");
        } else {
            debug!(task = %self.task, "no watermark yet");
        }

        Ok(value)
    }

    /// Step 2: pull the delta (or everything) from the source.
    async fn extract(&self, watermark: Option<&SqlValue>) -> Result<Vec<crate::adapter::Row>> {
        let sql = self.pipeline.extract();
        debug!(task = %self.task, source = %self.source.name(), "extracting rows");

        self.source
            .select(sql, watermark)
            .await
            .map_err(|e| step_error(StepName::Extract, Some(sql), e))
    }
}

fn step_error(step: StepName, statement: Option<&str>, err: SyncError) -> SyncError {
    SyncError::Execution {
        step: step.as_str().to_string(),
        statement: statement.map(String::from),
        reason: err.to_string(),
    }
}
