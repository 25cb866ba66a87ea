//! Job registry: loads jobs and flattens their schedules into triggers.
//!
//! One trigger descriptor is emitted per (schedule row x expanded time
//! slot). The registry is a hard error boundary: a store outage is logged
//! and yields an empty list, never a panic or error into the scheduling
//! loop. A single malformed schedule row is skipped with a warning while
//! its siblings proceed.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::core::slots::expand_slots;
use crate::core::trigger::TriggerDescriptor;
use crate::core::types::JobId;
use crate::store::{ConfigStore, JobRow, StoreError};

/// Loads active jobs from the config store as flattened trigger lists.
pub struct JobRegistry {
    store: Arc<dyn ConfigStore>,
}

impl JobRegistry {
    /// Create a registry reading from the given store.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Flatten every active job. Returns an empty list on store failure.
    pub async fn load_all(&self) -> Vec<TriggerDescriptor> {
        match self.try_load(None).await {
            Ok(triggers) => {
                debug!(count = triggers.len(), "Flattened triggers for all active jobs");
                triggers
            }
            Err(e) => {
                error!(error = %e, "Failed to load jobs from store; returning no triggers");
                Vec::new()
            }
        }
    }

    /// Flatten every active job, surfacing store failures to the caller.
    ///
    /// The scheduling loop uses this for its periodic reload so it can
    /// back off on a store outage instead of silently emptying the table.
    pub async fn load_all_checked(&self) -> Result<Vec<TriggerDescriptor>, StoreError> {
        self.try_load(None).await
    }

    /// Flatten one job. Returns an empty list on store failure or if the
    /// job is missing or inactive.
    pub async fn load_one(&self, job_id: JobId) -> Vec<TriggerDescriptor> {
        match self.try_load(Some(job_id)).await {
            Ok(triggers) => triggers,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to load job from store; returning no triggers");
                Vec::new()
            }
        }
    }

    async fn try_load(&self, job_id: Option<JobId>) -> Result<Vec<TriggerDescriptor>, StoreError> {
        let jobs: Vec<JobRow> = match job_id {
            None => self.store.active_jobs().await?,
            Some(id) => self.store.active_job(id).await?.into_iter().collect(),
        };

        let mut triggers = Vec::new();
        for job in jobs {
            let entries = self.store.schedule_entries(job.id).await?;
            for entry in entries {
                let slots = match expand_slots(
                    &entry.start_time,
                    entry.end_time.as_deref(),
                    entry.repeat_minutes.as_deref(),
                ) {
                    Ok(slots) => slots,
                    Err(e) => {
                        warn!(
                            job_id = %job.id,
                            schedule_id = %entry.id,
                            error = %e,
                            "Skipping malformed schedule entry"
                        );
                        continue;
                    }
                };
                for slot in slots {
                    triggers.push(TriggerDescriptor {
                        job_id: job.id,
                        schedule_id: entry.id,
                        job_name: job.name.clone(),
                        export_path: job.export_path.clone(),
                        export_name: job.export_name.clone(),
                        sql: job.sql.clone(),
                        weekday: entry.weekday.clone(),
                        time: slot,
                    });
                }
            }
        }
        Ok(triggers)
    }
}
