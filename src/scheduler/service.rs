//! Main service loop driving the trigger table.
//!
//! Each iteration checks the window since the previous pass, hands every
//! due trigger to the dispatcher without waiting for it, and then sleeps
//! an adaptive interval derived from the table: a near fire time shortens
//! the nap, an empty table lengthens it. The loop never exits on its own;
//! only the shutdown signal breaks it, after which the dispatcher drains.

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::runner::JobRunner;
use crate::scheduler::table::TriggerScheduler;

/// Sleep when the table has no bindings at all.
const EMPTY_TABLE_SLEEP: Duration = Duration::from_secs(120);
/// Longest sleep while bindings exist.
const MAX_SLEEP: Duration = Duration::from_secs(60);
/// Sleep when the next fire is imminent or overdue.
const NEAR_FIRE_SLEEP: Duration = Duration::from_secs(10);
/// Back-off after an iteration fault.
const ERROR_BACKOFF: Duration = Duration::from_secs(30);
/// Default interval between full table reloads.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// The scheduling loop plus its collaborators.
pub struct ExportService {
    scheduler: TriggerScheduler,
    dispatcher: Arc<Dispatcher>,
    runner: Arc<JobRunner>,
    reload_interval: Duration,
}

impl ExportService {
    /// Assemble the service from its parts.
    pub fn new(
        scheduler: TriggerScheduler,
        dispatcher: Arc<Dispatcher>,
        runner: Arc<JobRunner>,
    ) -> Self {
        Self {
            scheduler,
            dispatcher,
            runner,
            reload_interval: DEFAULT_RELOAD_INTERVAL,
        }
    }

    /// Set the interval between full table reloads.
    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// Run until the shutdown signal fires, then drain in-flight exports.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        self.scheduler.reload_all().await;
        info!(
            triggers = self.scheduler.trigger_count(),
            workers = self.dispatcher.max_workers(),
            "Export service started"
        );

        // Start the window one minute back so a trigger bound to the
        // current minute still fires on the first pass.
        let mut last_check = Local::now().naive_local() - chrono::Duration::seconds(60);
        let mut last_reload = tokio::time::Instant::now();

        loop {
            let now = Local::now().naive_local();
            self.dispatch_due(last_check, now).await;
            last_check = now;

            if last_reload.elapsed() >= self.reload_interval {
                match self.scheduler.try_reload_all().await {
                    Ok(_) => last_reload = tokio::time::Instant::now(),
                    Err(e) => {
                        // Keep the stale table and retry the reload after a
                        // short back-off instead of scheduling from nothing.
                        warn!(error = %e, "Periodic reload failed, backing off");
                        tokio::select! {
                            _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                            _ = &mut shutdown => {
                                info!("Shutdown signal received, stopping scheduler loop");
                                break;
                            }
                        }
                        continue;
                    }
                }
            }

            let nap = self.sleep_duration(now);
            debug!(sleep_secs = nap.as_secs(), "Scheduler idle");

            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping scheduler loop");
                    break;
                }
            }
        }

        self.dispatcher.drain().await;
        info!("Export service stopped");
    }

    /// Submit every trigger due in `(last_check, now]`.
    async fn dispatch_due(&self, last_check: NaiveDateTime, now: NaiveDateTime) {
        let due = self.scheduler.due_between(last_check, now);
        if due.is_empty() {
            return;
        }
        info!(count = due.len(), "Dispatching due exports");
        for trigger in due {
            let runner = Arc::clone(&self.runner);
            let label = trigger.job_name.clone();
            let accepted = self
                .dispatcher
                .submit(label.clone(), async move {
                    runner.execute(&trigger).await;
                })
                .await;
            if !accepted {
                warn!(job = %label, "Export dropped: dispatcher no longer accepting");
            }
        }
    }

    /// Pick the next nap length from the distance to the next fire time.
    fn sleep_duration(&self, now: NaiveDateTime) -> Duration {
        if self.scheduler.trigger_count() == 0 {
            return EMPTY_TABLE_SLEEP;
        }
        match self.scheduler.next_fire_after(now) {
            None => EMPTY_TABLE_SLEEP,
            Some(next) => {
                let until = (next - now).to_std().unwrap_or(Duration::ZERO);
                if until <= MAX_SLEEP {
                    NEAR_FIRE_SLEEP
                } else {
                    MAX_SLEEP
                }
            }
        }
    }
}
