//! Export execution: runs one trigger end to end.
//!
//! A run validates the SQL, streams the result through the delimited
//! writer, then records the outcome in the ledger. Validation rejections
//! abort before anything touches the filesystem or the source database
//! and leave the last-execution timestamp alone; runtime failures record
//! the timestamp so a broken job does not retrigger on every loop pass.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

use crate::core::trigger::TriggerDescriptor;
use crate::export::{is_read_only, DelimitedWriter};
use crate::ledger::{LogEntry, RunLedger};
use crate::source::{QuerySource, SourceError};

const LOG_SOURCE: &str = "executor";

/// Failure of a run that got past validation.
#[derive(Debug, Error)]
enum RunError {
    #[error("filesystem error on {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Final outcome of a single trigger execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// The export file was written with this many data rows.
    Completed { rows: u64 },
    /// The SQL was rejected before execution; no file, no timestamp.
    Rejected { reason: String },
    /// The run failed mid-flight; the timestamp was still recorded.
    Failed { reason: String },
}

/// Runs triggers against the source database and writes export files.
pub struct JobRunner {
    source: Arc<dyn QuerySource>,
    ledger: Arc<RunLedger>,
}

impl JobRunner {
    /// Create a runner over the given source and ledger.
    pub fn new(source: Arc<dyn QuerySource>, ledger: Arc<RunLedger>) -> Self {
        Self { source, ledger }
    }

    /// Execute one trigger end to end.
    ///
    /// Never returns an error: every failure mode ends in a ledger entry
    /// and a terminal outcome, so a panicking or erroring job can never
    /// take the worker down with it.
    pub async fn execute(&self, trigger: &TriggerDescriptor) -> ExportOutcome {
        let started = Instant::now();

        if trigger.sql.trim().is_empty() {
            let reason = "job has no SQL configured".to_string();
            self.ledger
                .log(LogEntry::error(LOG_SOURCE, &reason).with_job(trigger.job_id))
                .await;
            return ExportOutcome::Rejected { reason };
        }

        if !is_read_only(&trigger.sql) {
            let reason = format!(
                "SQL for job '{}' rejected: not a read-only statement",
                trigger.job_name
            );
            self.ledger
                .log(LogEntry::error(LOG_SOURCE, &reason).with_job(trigger.job_id))
                .await;
            return ExportOutcome::Rejected { reason };
        }

        debug!(job_id = %trigger.job_id, job = %trigger.job_name, "Starting export");

        match self.run_export(trigger).await {
            Ok(rows) => {
                self.ledger.record_completion(trigger.job_id).await;
                let duration_ms = started.elapsed().as_millis() as i64;
                self.ledger
                    .log(
                        LogEntry::info(
                            LOG_SOURCE,
                            format!(
                                "Exported {} rows for job '{}' to {}",
                                rows,
                                trigger.job_name,
                                trigger.output_file().display()
                            ),
                        )
                        .with_job(trigger.job_id)
                        .with_duration_ms(duration_ms),
                    )
                    .await;
                ExportOutcome::Completed { rows }
            }
            Err(e) => {
                // Timestamp is recorded even on failure so the loop does
                // not hammer a broken job.
                self.ledger.record_completion(trigger.job_id).await;
                let reason = format!("export for job '{}' failed: {}", trigger.job_name, e);
                self.ledger
                    .log(
                        LogEntry::error(LOG_SOURCE, &reason)
                            .with_job(trigger.job_id)
                            .with_duration_ms(started.elapsed().as_millis() as i64),
                    )
                    .await;
                ExportOutcome::Failed { reason }
            }
        }
    }

    async fn run_export(&self, trigger: &TriggerDescriptor) -> Result<u64, RunError> {
        tokio::fs::create_dir_all(&trigger.export_path)
            .await
            .map_err(|e| RunError::Filesystem {
                path: trigger.export_path.clone(),
                source: e,
            })?;

        let mut stream = self.source.open(&trigger.sql).await?;

        let output = trigger.output_file();
        let fs_err = |e: std::io::Error| RunError::Filesystem {
            path: output.display().to_string(),
            source: e,
        };

        let mut writer = DelimitedWriter::create(&output).map_err(fs_err)?;
        writer.write_record(stream.columns()).map_err(fs_err)?;

        let mut rows: u64 = 0;
        while let Some(batch) = stream.next_batch().await? {
            for row in &batch {
                writer.write_record(row).map_err(fs_err)?;
            }
            rows += batch.len() as u64;
        }
        writer.finish().map_err(fs_err)?;
        Ok(rows)
    }
}
