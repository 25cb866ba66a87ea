//! Trigger-table reload behavior against a shared store.

use exportd::{InMemoryStore, JobId, JobRegistry, RegisterOutcome, TriggerScheduler};
use std::sync::Arc;

use crate::common::{job, schedule};

fn test_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[tokio::test]
async fn reload_is_idempotent_for_unchanged_store() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", Some("09:00"), Some("15")));
    store.insert_schedule(schedule(2, 1, "Fri", "18:30", None, None));

    let mut scheduler = TriggerScheduler::new(JobRegistry::new(store));

    // 5 slots Monday (08:00..09:00 every 15) + 1 Friday.
    let first = scheduler.reload_all().await;
    assert_eq!(first, 6);
    let second = scheduler.reload_all().await;
    assert_eq!(second, first);
    assert_eq!(scheduler.trigger_count(), 6);
}

#[tokio::test]
async fn one_bad_weekday_skips_only_that_binding() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));
    store.insert_schedule(schedule(2, 1, "Funday", "09:00", None, None));
    store.insert_schedule(schedule(3, 1, "Wed", "10:00", None, None));

    let registry = JobRegistry::new(store);
    let triggers = registry.load_all().await;
    assert_eq!(triggers.len(), 3);

    let mut scheduler = TriggerScheduler::new(JobRegistry::new(Arc::new(InMemoryStore::new())));
    let outcomes = scheduler.register(triggers);
    let registered = outcomes
        .iter()
        .filter(|o| matches!(o, RegisterOutcome::Registered { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, RegisterOutcome::Skipped { .. }))
        .count();

    assert_eq!(registered, 2);
    assert_eq!(skipped, 1);
    assert_eq!(scheduler.trigger_count(), 2);
}

#[tokio::test]
async fn malformed_schedule_row_does_not_abort_siblings() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    // Inverted window: rejected during flattening.
    store.insert_schedule(schedule(1, 1, "Mon", "10:00", Some("09:00"), Some("30")));
    store.insert_schedule(schedule(2, 1, "Tue", "11:00", None, None));

    let registry = JobRegistry::new(store);
    let triggers = registry.load_all().await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].weekday, "Tue");
}

#[tokio::test]
async fn deactivated_job_disappears_on_reload() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let mut scheduler = TriggerScheduler::new(JobRegistry::new(store.clone()));
    assert_eq!(scheduler.reload_all().await, 1);

    let mut deactivated = job(1, dir.path(), "SELECT 1");
    deactivated.active = false;
    store.insert_job(deactivated);

    assert_eq!(scheduler.reload_all().await, 0);
    assert_eq!(scheduler.trigger_count(), 0);
}

#[tokio::test]
async fn store_outage_keeps_table_on_checked_reload() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let mut scheduler = TriggerScheduler::new(JobRegistry::new(store.clone()));
    scheduler.reload_all().await;
    assert_eq!(scheduler.trigger_count(), 1);

    store.fail_reads(true);
    assert!(scheduler.try_reload_all().await.is_err());
    // The stale table survives a failed checked reload.
    assert_eq!(scheduler.trigger_count(), 1);

    store.fail_reads(false);
    assert_eq!(scheduler.try_reload_all().await.unwrap(), 1);
}

#[tokio::test]
async fn reload_job_leaves_other_jobs_untouched() {
    let dir = test_dir();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_job(job(2, dir.path(), "SELECT 2"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));
    store.insert_schedule(schedule(2, 2, "Tue", "09:00", None, None));

    let mut scheduler = TriggerScheduler::new(JobRegistry::new(store.clone()));
    scheduler.reload_all().await;

    store.insert_schedule(schedule(3, 2, "Wed", "10:00", None, None));
    assert_eq!(scheduler.reload_job(JobId::new(2)).await, 2);
    assert_eq!(scheduler.trigger_count(), 3);
}
