//! In-memory trigger table keyed by (weekday, time-of-day).
//!
//! The table is the scheduler's working set: rebuilt wholesale from the
//! registry on reload, probed every loop iteration for bindings whose
//! weekly occurrence falls inside the elapsed window. All times are local
//! wall clock with minute resolution.

use chrono::{Datelike, Days, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::core::trigger::TriggerDescriptor;
use crate::core::types::{JobId, TimeOfDay, Weekday};
use crate::registry::JobRegistry;

/// Per-descriptor result of a registration pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    /// The descriptor was bound into the table.
    Registered {
        job_id: JobId,
        weekday: Weekday,
        time: TimeOfDay,
    },
    /// The descriptor was rejected; the rest of the batch is unaffected.
    Skipped { job_id: JobId, reason: String },
}

/// Trigger table mapping (weekday, time) to the descriptors firing then.
pub struct TriggerScheduler {
    registry: JobRegistry,
    bindings: HashMap<(Weekday, TimeOfDay), Vec<TriggerDescriptor>>,
}

impl TriggerScheduler {
    /// Create an empty table backed by the given registry.
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
        }
    }

    /// Drop every binding and rebuild the table from all active jobs.
    ///
    /// Idempotent: two consecutive reloads against an unchanged store
    /// produce the same table.
    pub async fn reload_all(&mut self) -> usize {
        self.bindings.clear();
        let triggers = self.registry.load_all().await;
        let outcomes = self.register(triggers);
        let registered = outcomes
            .iter()
            .filter(|o| matches!(o, RegisterOutcome::Registered { .. }))
            .count();
        info!(
            bindings = self.bindings.len(),
            triggers = registered,
            "Reloaded trigger table"
        );
        registered
    }

    /// Like `reload_all`, but keeps the existing table and reports the
    /// error when the store is unreachable.
    pub async fn try_reload_all(&mut self) -> Result<usize, crate::store::StoreError> {
        let triggers = self.registry.load_all_checked().await?;
        self.bindings.clear();
        let outcomes = self.register(triggers);
        let registered = outcomes
            .iter()
            .filter(|o| matches!(o, RegisterOutcome::Registered { .. }))
            .count();
        info!(
            bindings = self.bindings.len(),
            triggers = registered,
            "Reloaded trigger table"
        );
        Ok(registered)
    }

    /// Rebuild the bindings of a single job, leaving the rest untouched.
    pub async fn reload_job(&mut self, job_id: JobId) -> usize {
        self.remove_job(job_id);
        let triggers = self.registry.load_one(job_id).await;
        let outcomes = self.register(triggers);
        outcomes
            .iter()
            .filter(|o| matches!(o, RegisterOutcome::Registered { .. }))
            .count()
    }

    /// Bind a batch of descriptors, one outcome per descriptor.
    ///
    /// A descriptor whose stored weekday does not resolve is skipped with
    /// a warning; the remaining descriptors are still bound.
    pub fn register(&mut self, triggers: Vec<TriggerDescriptor>) -> Vec<RegisterOutcome> {
        let mut outcomes = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            let weekday: Weekday = match trigger.weekday.parse() {
                Ok(day) => day,
                Err(e) => {
                    warn!(
                        job_id = %trigger.job_id,
                        schedule_id = %trigger.schedule_id,
                        weekday = %trigger.weekday,
                        "Skipping trigger with unrecognized weekday"
                    );
                    outcomes.push(RegisterOutcome::Skipped {
                        job_id: trigger.job_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let job_id = trigger.job_id;
            let time = trigger.time;
            debug!(job_id = %job_id, weekday = %weekday, time = %time, "Registered trigger");
            self.bindings.entry((weekday, time)).or_default().push(trigger);
            outcomes.push(RegisterOutcome::Registered {
                job_id,
                weekday,
                time,
            });
        }
        outcomes
    }

    /// Remove every binding belonging to a job.
    pub fn remove_job(&mut self, job_id: JobId) {
        self.bindings.retain(|_, triggers| {
            triggers.retain(|t| t.job_id != job_id);
            !triggers.is_empty()
        });
    }

    /// Number of distinct (weekday, time) keys.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Total number of registered descriptors.
    pub fn trigger_count(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Descriptors whose most recent weekly occurrence lies in `(last, now]`.
    ///
    /// The half-open window means a binding fires exactly once per week no
    /// matter how tightly the loop polls, and an occurrence is never lost
    /// to a slow iteration as long as the gap stays under a week.
    pub fn due_between(&self, last: NaiveDateTime, now: NaiveDateTime) -> Vec<TriggerDescriptor> {
        let mut due = Vec::new();
        for ((weekday, time), triggers) in &self.bindings {
            if let Some(fired) = occurrence_on_or_before(now, *weekday, *time) {
                if fired > last {
                    due.extend(triggers.iter().cloned());
                }
            }
        }
        due
    }

    /// The earliest occurrence of any binding strictly after `now`.
    pub fn next_fire_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.bindings
            .keys()
            .filter_map(|(weekday, time)| occurrence_after(now, *weekday, *time))
            .min()
    }
}

/// Most recent datetime at or before `now` falling on `weekday` at `time`.
fn occurrence_on_or_before(
    now: NaiveDateTime,
    weekday: Weekday,
    time: TimeOfDay,
) -> Option<NaiveDateTime> {
    let target: chrono::Weekday = weekday.into();
    for days_back in 0..=7u64 {
        let date = now.date().checked_sub_days(Days::new(days_back))?;
        if date.weekday() != target {
            continue;
        }
        let candidate = date.and_time(time.as_time());
        if candidate <= now {
            return Some(candidate);
        }
    }
    None
}

/// Earliest datetime strictly after `now` falling on `weekday` at `time`.
fn occurrence_after(now: NaiveDateTime, weekday: Weekday, time: TimeOfDay) -> Option<NaiveDateTime> {
    let target: chrono::Weekday = weekday.into();
    for days_ahead in 0..=7u64 {
        let date = now.date().checked_add_days(Days::new(days_ahead))?;
        if date.weekday() != target {
            continue;
        }
        let candidate = date.and_time(time.as_time());
        if candidate > now {
            return Some(candidate);
        }
    }
    None
}
