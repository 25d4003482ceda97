//! Query compilation
//!
//! Turns a [`LoadPlan`] into the four named statements of the pipeline:
//! watermark, extract, stage, finish. The pipeline has a fixed shape with
//! per-strategy constructors, so an illegal combination (a Full plan with a
//! finish statement, a Replace plan with a watermark) cannot be built.
//!
//! Column lists are always explicit and ordered per the resolved DDL;
//! `SELECT *` is never emitted, so schema drift surfaces at plan time.

use tabsync_common::{Result, SyncError};

use crate::adapter::{qualified, DbAdapter, WATERMARK_PARAM};
use crate::config::{IncrementalConfig, TableRef};
use crate::ddl::ResolvedDdl;
use crate::plan::{LoadPlan, LoadStrategy};

/// Pipeline step names, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepName {
    Watermark,
    Extract,
    Stage,
    LoadRows,
    Finish,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Watermark => "watermark",
            StepName::Extract => "extract",
            StepName::Stage => "stage",
            StepName::LoadRows => "load_rows",
            StepName::Finish => "finish",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The compiled statements for one task invocation.
///
/// `extract` is always present; the other statements depend on the strategy
/// and are only constructible in the legal combinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPipeline {
    watermark: Option<String>,
    extract: String,
    stage: Option<String>,
    finish: Option<String>,
}

impl CompiledPipeline {
    fn full(extract: String, stage: String) -> Self {
        Self {
            watermark: None,
            extract,
            stage: Some(stage),
            finish: None,
        }
    }

    fn replace(extract: String, stage: String, finish: String) -> Self {
        Self {
            watermark: None,
            extract,
            stage: Some(stage),
            finish: Some(finish),
        }
    }

    fn merge(watermark: String, extract: String, stage: String, finish: String) -> Self {
        Self {
            watermark: Some(watermark),
            extract,
            stage: Some(stage),
            finish: Some(finish),
        }
    }

    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref()
    }

    pub fn extract(&self) -> &str {
        &self.extract
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn finish(&self) -> Option<&str> {
        self.finish.as_deref()
    }

    /// Present statements in fixed order: watermark, extract, stage, finish.
    pub fn steps(&self) -> Vec<(StepName, &str)> {
        let mut steps = Vec::with_capacity(4);
        if let Some(sql) = self.watermark() {
            steps.push((StepName::Watermark, sql));
        }
        steps.push((StepName::Extract, self.extract()));
        if let Some(sql) = self.stage() {
            steps.push((StepName::Stage, sql));
        }
        if let Some(sql) = self.finish() {
            steps.push((StepName::Finish, sql));
        }
        steps
    }
}

/// Builds the compiled pipeline for one plan.
pub struct QueryCompiler<'a> {
    plan: &'a LoadPlan,
    source: &'a TableRef,
    ddl: &'a ResolvedDdl,
    incremental: Option<&'a IncrementalConfig>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(
        plan: &'a LoadPlan,
        source: &'a TableRef,
        ddl: &'a ResolvedDdl,
        incremental: Option<&'a IncrementalConfig>,
    ) -> Self {
        Self {
            plan,
            source,
            ddl,
            incremental,
        }
    }

    /// Compile the statements, using the destination adapter's dialect for
    /// table creation, move and merge.
    pub fn compile(&self, destination: &dyn DbAdapter) -> Result<CompiledPipeline> {
        match self.plan.strategy {
            LoadStrategy::Full => {
                let stage = format!(
                    "-- Create table\n{}",
                    destination.create_table_sql(
                        &self.plan.load_table,
                        self.plan.load_schema.as_deref(),
                        self.ddl,
                        false,
                    )
                );
                Ok(CompiledPipeline::full(self.extract_sql(None), stage))
            }
            LoadStrategy::Replace => {
                let stage = format!(
                    "-- Create temporary table\n{}",
                    destination.create_table_sql(
                        &self.plan.load_table,
                        self.plan.load_schema.as_deref(),
                        self.ddl,
                        true,
                    )
                );
                let finish = destination.move_table_sql(
                    &self.plan.load_table,
                    self.plan.load_schema.as_deref(),
                    &self.plan.final_table,
                    self.plan.final_schema.as_deref(),
                    self.ddl,
                );
                Ok(CompiledPipeline::replace(
                    self.extract_sql(None),
                    stage,
                    finish,
                ))
            }
            LoadStrategy::Merge => {
                let incremental = self.incremental.ok_or_else(|| {
                    SyncError::Internal(
                        "merge plan compiled without incremental configuration".to_string(),
                    )
                })?;

                let stage = format!(
                    "-- Create temporary table\n{}",
                    destination.create_table_sql(
                        &self.plan.load_table,
                        self.plan.load_schema.as_deref(),
                        self.ddl,
                        true,
                    )
                );
                let finish = destination.merge_tables_sql(
                    &self.plan.load_table,
                    self.plan.load_schema.as_deref(),
                    &self.plan.final_table,
                    self.plan.final_schema.as_deref(),
                    &incremental.delete_key,
                    self.ddl,
                );
                Ok(CompiledPipeline::merge(
                    self.watermark_sql(&incremental.incremental_key),
                    self.extract_sql(Some(&incremental.incremental_key)),
                    stage,
                    finish,
                ))
            }
        }
    }

    /// Maximum non-null incremental key value already in the destination.
    fn watermark_sql(&self, incremental_key: &str) -> String {
        format!(
            "SELECT MAX({key}) FROM {table} WHERE {key} IS NOT NULL",
            key = incremental_key,
            table = self.plan.final_target(),
        )
    }

    /// Ordered-column select from the source, with the incremental filter
    /// when extracting a merge delta.
    fn extract_sql(&self, incremental_key: Option<&str>) -> String {
        let columns = self.ddl.column_list();
        let table = qualified(&self.source.table, self.source.schema.as_deref());

        match incremental_key {
            Some(key) => format!(
                "SELECT {columns} FROM {table} WHERE {key} IS NULL OR {key} > {param}",
                columns = columns,
                table = table,
                key = key,
                param = WATERMARK_PARAM,
            ),
            None => format!("SELECT {} FROM {}", columns, table),
        }
    }
}
