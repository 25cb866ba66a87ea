//! Config-store abstraction for jobs, schedule entries, and the durable log.
//!
//! The core only reads job and schedule rows; its writes are limited to the
//! last-execution timestamp and appended log entries. Backends are pluggable
//! (in-memory for tests and development, SQLite for persistence).

mod memory;
#[cfg(any(feature = "sqlite", test))]
mod sqlite;

pub use memory::InMemoryStore;
#[cfg(any(feature = "sqlite", test))]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{JobId, ScheduleId};
use crate::ledger::LogEntry;

/// Errors that can occur during config-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store lock was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Generic store error (driver detail in the message).
    #[error("store error: {0}")]
    Other(String),
}

/// A job row as owned by the config store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRow {
    /// Job identifier.
    pub id: JobId,
    /// Human-readable name.
    pub name: String,
    /// Whether the job participates in scheduling.
    pub active: bool,
    /// Directory exports are written to.
    pub export_path: String,
    /// Base name of the export file.
    pub export_name: String,
    /// SQL text to run; may be empty for a job that is not yet configured.
    pub sql: String,
    /// Timestamp of the last attempted execution.
    pub last_exec: Option<DateTime<Utc>>,
}

/// A schedule entry row: one weekday plus a time window for a job.
///
/// Times and the repeat interval stay as stored text here; they are parsed
/// during flattening so one malformed row can be skipped without touching
/// its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Entry identifier.
    pub id: ScheduleId,
    /// Owning job.
    pub job_id: JobId,
    /// Weekday name, e.g. "Mon".
    pub weekday: String,
    /// Window start, "HH:MM".
    pub start_time: String,
    /// Optional window end, "HH:MM".
    pub end_time: Option<String>,
    /// Optional repeat interval in minutes.
    pub repeat_minutes: Option<String>,
}

/// Store of jobs, schedules, and the durable log sink.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// List all active jobs.
    async fn active_jobs(&self) -> Result<Vec<JobRow>, StoreError>;

    /// Fetch a single job if it exists and is active.
    async fn active_job(&self, id: JobId) -> Result<Option<JobRow>, StoreError>;

    /// List the schedule entries of a job.
    async fn schedule_entries(&self, job_id: JobId) -> Result<Vec<ScheduleRow>, StoreError>;

    /// Write back the last-execution timestamp of a job.
    ///
    /// Independent of any export transaction: an export failure must not
    /// roll this write back.
    async fn set_last_exec(&self, job_id: JobId, when: DateTime<Utc>) -> Result<(), StoreError>;

    /// Append an entry to the durable log table.
    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError>;
}
