//! Run ledger: completion timestamps and dual-sink logging.
//!
//! Every job run produces at least one log entry and a last-execution
//! timestamp. Entries always go to the console stream synchronously via
//! `tracing`; the durable store sink is best-effort, and its failures are
//! counted rather than propagated, because logging must never fail a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::types::JobId;
use crate::store::ConfigStore;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Name as written to the durable log table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured log entry, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Logical source, e.g. "scheduler" or "executor".
    pub source: String,
    /// Job the entry belongs to, if any.
    pub job_id: Option<JobId>,
    /// Acting user, if any.
    pub user: Option<String>,
    /// Message text.
    pub message: String,
    /// Run duration in milliseconds, for completion entries.
    pub duration_ms: Option<i64>,
}

impl LogEntry {
    /// Create an entry with the given level, source, and message.
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            job_id: None,
            user: None,
            message: message.into(),
            duration_ms: None,
        }
    }

    /// Shorthand for an info entry.
    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, source, message)
    }

    /// Shorthand for a warning entry.
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, source, message)
    }

    /// Shorthand for an error entry.
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, source, message)
    }

    /// Attach a job id.
    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Attach a duration in milliseconds.
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a user name.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Records run completions and fans log entries out to both sinks.
pub struct RunLedger {
    store: Arc<dyn ConfigStore>,
    sink_failures: AtomicU64,
}

impl RunLedger {
    /// Create a ledger writing through the given store.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Record the current time as the job's last execution.
    ///
    /// Runs in its own store call so an export failure cannot undo it. A
    /// store failure here is reported to the console stream only.
    pub async fn record_completion(&self, job_id: JobId) {
        if let Err(e) = self.store.set_last_exec(job_id, Utc::now()).await {
            warn!(job_id = %job_id, error = %e, "Failed to record last-execution timestamp");
        }
    }

    /// Emit an entry to the console stream and, best-effort, to the durable
    /// log table.
    ///
    /// Durable-sink failures are counted and reported to the console stream;
    /// they never propagate to the caller.
    pub async fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => {
                debug!(source = %entry.source, job_id = ?entry.job_id, "{}", entry.message)
            }
            LogLevel::Info => {
                info!(source = %entry.source, job_id = ?entry.job_id, "{}", entry.message)
            }
            LogLevel::Warning => {
                warn!(source = %entry.source, job_id = ?entry.job_id, "{}", entry.message)
            }
            LogLevel::Error => {
                error!(source = %entry.source, job_id = ?entry.job_id, "{}", entry.message)
            }
        }

        if let Err(e) = self.store.append_log(&entry).await {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Durable log sink write failed; entry kept on console only");
        }
    }

    /// Number of durable-sink writes that have failed so far.
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }
}
