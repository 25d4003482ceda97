//! tabsync - table copy tool

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

use tabsync_common::logging::{init_logging, LogConfig, LogLevel};
use tabsync_common::properties::Parameters;
use tabsync_engine::adapter::{ConnectionRegistry, PostgresAdapter};
use tabsync_engine::persister::{FileStatementWriter, StatementWriter};
use tabsync_engine::task::CopyTask;

use config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(name = "tabsync")]
#[command(author, version, about = "Table synchronization tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project file
    #[arg(short, long, default_value = "tabsync.json", global = true)]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Execute copy tasks
    Run {
        /// Only run the named task
        #[arg(long)]
        task: Option<String>,

        /// Also write the compiled statements to this directory
        #[arg(long)]
        queries_dir: Option<PathBuf>,
    },

    /// Compile task statements to disk without executing anything
    Compile {
        /// Only compile the named task
        #[arg(long)]
        task: Option<String>,

        /// Output directory for compiled statements
        #[arg(long, default_value = "compile")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let project = ProjectConfig::load(&cli.project)?;
    let registry = connect_databases(&project).await?;
    let params: Parameters = project
        .parameters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let (filter, writer, execute) = match &cli.command {
        Command::Run { task, queries_dir } => (
            task.clone(),
            queries_dir
                .as_ref()
                .map(|dir| Arc::new(FileStatementWriter::new(dir.clone()))),
            true,
        ),
        Command::Compile { task, out } => (
            task.clone(),
            Some(Arc::new(FileStatementWriter::new(out.clone()))),
            false,
        ),
    };

    let run_id = Uuid::new_v4();
    info!(run_id = %run_id, project = %cli.project.display(), "starting");

    let mut failures = 0usize;
    let mut selected = 0usize;

    for raw in &project.tasks {
        if let Some(name) = &filter {
            if &raw.name != name {
                continue;
            }
        }
        selected += 1;

        let mut task = CopyTask::new(raw.clone(), registry.clone());
        if let Some(writer) = &writer {
            task = task.with_statement_writer(Arc::clone(writer) as Arc<dyn StatementWriter>);
        }

        let outcome = task.setup(&params).await;
        if outcome.is_failed() {
            failures += 1;
            continue;
        }

        let outcome = if execute {
            task.run().await
        } else {
            task.compile().await
        };
        if outcome.is_failed() {
            failures += 1;
        }
    }

    if selected == 0 {
        match filter {
            Some(name) => bail!("no task named '{}' in the project file", name),
            None => bail!("no tasks selected"),
        }
    }

    if failures > 0 {
        error!(run_id = %run_id, failures, "finished with failures");
        bail!("{} of {} task(s) failed", failures, selected);
    }

    info!(run_id = %run_id, tasks = selected, "finished");
    Ok(())
}

async fn connect_databases(project: &ProjectConfig) -> Result<ConnectionRegistry> {
    let mut registry = ConnectionRegistry::new();

    for (name, db) in &project.databases {
        let url = db.resolve_url(name)?;
        let adapter = PostgresAdapter::connect(name.clone(), &url, db.max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to database '{}': {}", name, e))?;
        registry.insert(name.clone(), Arc::new(adapter));
        info!(database = %name, "connected");
    }

    Ok(registry)
}
