//! exportd - recurring SQL-export scheduling service.
//!
//! Usage:
//!   exportd run [-c config.yaml]        Run the scheduling service
//!   exportd list [-c config.yaml]       List jobs with their expanded slots
//!   exportd trigger <JOB_ID>            Execute one job immediately
//!   exportd check-sql <FILE>            Validate a SQL file as read-only

use clap::{Parser, Subcommand};
use exportd::{
    AppConfig, Dispatcher, ExportService, InMemoryStore, JobId, JobRegistry, JobRunner, LogEntry,
    RunLedger, SqliteSource, StoreConfig, TriggerScheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// exportd - recurring SQL-export scheduling service
#[derive(Parser)]
#[command(name = "exportd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "exportd.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling service until interrupted
    Run,

    /// List active jobs with their expanded trigger slots
    List,

    /// Execute one job immediately, outside its schedule
    Trigger {
        /// Job id to execute
        #[arg(value_name = "JOB_ID")]
        job_id: i64,
    },

    /// Check whether a SQL file passes read-only validation
    CheckSql {
        /// Path to the file containing the statement
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_service(&cli.config).await?,
        Commands::List => list_jobs(&cli.config).await?,
        Commands::Trigger { job_id } => trigger_job(&cli.config, JobId::new(job_id)).await?,
        Commands::CheckSql { file } => check_sql(&file)?,
    }

    Ok(())
}

/// Open the configured store backend.
async fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn exportd::ConfigStore>, Box<dyn std::error::Error>> {
    match &config.store {
        StoreConfig::Memory => {
            warn!("Using in-memory store: jobs and logs will not persist");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StoreConfig::Sqlite { path } => {
            info!(path = %path, "Opening SQLite config store");
            Ok(Arc::new(exportd::SqliteStore::new(path).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreConfig::Sqlite { .. } => {
            Err("store type 'sqlite' requires the 'sqlite' feature".into())
        }
    }
}

/// Run the scheduling service until Ctrl-C.
async fn run_service(config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let store = open_store(&config).await?;

    let source = Arc::new(SqliteSource::new(&config.source_path, config.prefetch_rows));
    let ledger = Arc::new(RunLedger::new(Arc::clone(&store)));
    let runner = Arc::new(JobRunner::new(source, ledger));
    let dispatcher = Arc::new(Dispatcher::new(config.workers));
    let scheduler = TriggerScheduler::new(JobRegistry::new(store));

    let service = ExportService::new(scheduler, dispatcher, runner)
        .with_reload_interval(Duration::from_secs(config.reload_interval_secs));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    service.run(shutdown_rx).await;
    Ok(())
}

/// Print every active job with its expanded trigger slots.
async fn list_jobs(config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let store = open_store(&config).await?;
    let registry = JobRegistry::new(store);

    let triggers = registry.load_all().await;
    if triggers.is_empty() {
        println!("No active jobs.");
        return Ok(());
    }

    let mut current: Option<JobId> = None;
    for trigger in &triggers {
        if current != Some(trigger.job_id) {
            println!(
                "{} ({}) -> {}",
                trigger.job_name,
                trigger.job_id,
                trigger.output_file().display()
            );
            current = Some(trigger.job_id);
        }
        println!("  {} {}", trigger.weekday, trigger.time);
    }
    println!("{} trigger(s) total.", triggers.len());
    Ok(())
}

/// Execute one job immediately, outside its schedule.
async fn trigger_job(
    config_path: &PathBuf,
    job_id: JobId,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let store = open_store(&config).await?;

    let registry = JobRegistry::new(Arc::clone(&store));
    let triggers = registry.load_one(job_id).await;
    let Some(trigger) = triggers.into_iter().next() else {
        error!(job_id = %job_id, "Job not found, inactive, or without a valid schedule");
        std::process::exit(1);
    };

    let source = Arc::new(SqliteSource::new(&config.source_path, config.prefetch_rows));
    let ledger = Arc::new(RunLedger::new(store));
    let runner = JobRunner::new(source, Arc::clone(&ledger));

    // Manual runs are audited with the invoking OS user when known.
    let mut audit = LogEntry::info("cli", "Manual trigger requested").with_job(job_id);
    if let Ok(user) = std::env::var("USER") {
        audit = audit.with_user(user);
    }
    ledger.log(audit).await;

    match runner.execute(&trigger).await {
        exportd::ExportOutcome::Completed { rows } => {
            println!(
                "Exported {} rows to {}",
                rows,
                trigger.output_file().display()
            );
            Ok(())
        }
        exportd::ExportOutcome::Rejected { reason }
        | exportd::ExportOutcome::Failed { reason } => {
            error!(job_id = %job_id, "{}", reason);
            std::process::exit(1);
        }
    }
}

/// Validate a SQL file against the read-only rules.
fn check_sql(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let sql = std::fs::read_to_string(file)?;
    if sql.trim().is_empty() {
        println!("REJECTED: file contains no SQL");
        std::process::exit(1);
    }
    if exportd::is_read_only(&sql) {
        println!("OK: statement is read-only");
        Ok(())
    } else {
        println!("REJECTED: statement is not read-only");
        std::process::exit(1);
    }
}
