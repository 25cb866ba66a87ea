//! In-memory config store.
//!
//! Thread-safe backend for tests and development. Carries small failure
//! switches so error paths (store outage, durable-sink failure) can be
//! exercised without a real database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{ConfigStore, JobRow, ScheduleRow, StoreError};
use crate::core::types::JobId;
use crate::ledger::LogEntry;

/// In-memory config store backend.
pub struct InMemoryStore {
    jobs: RwLock<HashMap<JobId, JobRow>>,
    schedules: RwLock<Vec<ScheduleRow>>,
    logs: RwLock<Vec<LogEntry>>,
    fail_reads: AtomicBool,
    fail_log_writes: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            schedules: RwLock::new(Vec::new()),
            logs: RwLock::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_log_writes: AtomicBool::new(false),
        }
    }

    /// Insert or replace a job row.
    pub fn insert_job(&self, job: JobRow) {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id, job);
    }

    /// Insert a schedule entry row.
    pub fn insert_schedule(&self, entry: ScheduleRow) {
        self.schedules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    /// Snapshot of the durable log table.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.logs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make all read operations fail, to exercise outage handling.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make durable log writes fail, to exercise the best-effort sink path.
    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Other("store unavailable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn active_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        self.check_reads()?;
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut result: Vec<_> = jobs.values().filter(|j| j.active).cloned().collect();
        result.sort_by_key(|j| j.id.as_i64());
        Ok(result)
    }

    async fn active_job(&self, id: JobId) -> Result<Option<JobRow>, StoreError> {
        self.check_reads()?;
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(jobs.get(&id).filter(|j| j.active).cloned())
    }

    async fn schedule_entries(&self, job_id: JobId) -> Result<Vec<ScheduleRow>, StoreError> {
        self.check_reads()?;
        let schedules = self.schedules.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(schedules
            .iter()
            .filter(|s| s.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn set_last_exec(&self, job_id: JobId, when: DateTime<Utc>) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::LockPoisoned)?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job: {}", job_id)))?;
        job.last_exec = Some(when);
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("log sink unavailable".into()));
        }
        let mut logs = self.logs.write().map_err(|_| StoreError::LockPoisoned)?;
        logs.push(entry.clone());
        Ok(())
    }
}
