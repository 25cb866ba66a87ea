//! Worker-pool isolation and graceful drain behavior.

use exportd::{
    ConfigStore, Dispatcher, ExportService, InMemoryStore, JobId, JobRegistry, JobRunner,
    RunLedger, StaticSource, TriggerScheduler,
};
use chrono::{Datelike, Local, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::common::{job, schedule, wait_until};

#[tokio::test]
async fn slow_job_does_not_delay_second_due_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_job(job(2, dir.path(), "SELECT 2"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));
    store.insert_schedule(schedule(2, 2, "Mon", "08:00", None, None));

    let triggers = JobRegistry::new(store.clone()).load_all().await;
    assert_eq!(triggers.len(), 2);

    // Every stream stalls 200ms per batch; with two workers the jobs
    // overlap instead of queueing behind one another.
    let source = Arc::new(
        StaticSource::new(vec!["n"], vec![vec!["1"]])
            .with_batch_delay(Duration::from_millis(200)),
    );
    let runner = Arc::new(JobRunner::new(source, Arc::new(RunLedger::new(store))));
    let dispatcher = Dispatcher::new(2);

    let started = tokio::time::Instant::now();
    for trigger in triggers {
        let runner = Arc::clone(&runner);
        dispatcher
            .submit(trigger.job_name.clone(), async move {
                runner.execute(&trigger).await;
            })
            .await;
    }
    dispatcher.drain().await;

    // Serialized execution would need at least 400ms.
    assert!(started.elapsed() < Duration::from_millis(390));
    assert!(dir.path().join("job1.csv").exists());
    assert!(dir.path().join("job2.csv").exists());
}

#[tokio::test]
async fn drain_finishes_in_flight_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = JobRegistry::new(store.clone())
        .load_all()
        .await
        .into_iter()
        .next()
        .unwrap();

    let source = Arc::new(
        StaticSource::new(vec!["n"], vec![vec!["1"]])
            .with_batch_delay(Duration::from_millis(100)),
    );
    let runner = Arc::new(JobRunner::new(source, Arc::new(RunLedger::new(store))));
    let dispatcher = Dispatcher::new(1);

    {
        let runner = Arc::clone(&runner);
        dispatcher
            .submit("slow".into(), async move {
                runner.execute(&trigger).await;
            })
            .await;
    }

    // Drain must block until the export file landed.
    dispatcher.drain().await;
    assert!(dir.path().join("job1.csv").exists());

    // And no new work is accepted afterwards.
    assert!(!dispatcher.submit("late".into(), async {}).await);
}

#[tokio::test]
async fn service_shutdown_drains_running_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());

    // Bind the current minute on today's weekday so the first loop pass
    // dispatches immediately.
    let now = Local::now();
    let weekday = exportd::Weekday::from(now.weekday()).to_string();
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(
        1,
        1,
        &weekday,
        &format!("{:02}:{:02}", now.hour(), now.minute()),
        None,
        None,
    ));

    let source = Arc::new(
        StaticSource::new(vec!["n"], vec![vec!["1"]])
            .with_batch_delay(Duration::from_millis(150)),
    );
    let ledger = Arc::new(RunLedger::new(store.clone()));
    let runner = Arc::new(JobRunner::new(source, ledger));
    let scheduler = TriggerScheduler::new(JobRegistry::new(store.clone()));
    let service = ExportService::new(scheduler, Arc::new(Dispatcher::new(2)), runner);

    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(service.run(rx));

    // Stop while the export is still streaming; drain must finish it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();
    task.await.unwrap();

    assert!(dir.path().join("job1.csv").exists());
    let stored = store.active_job(JobId::new(1)).await.unwrap().unwrap();
    assert!(stored.last_exec.is_some());
}

#[tokio::test]
async fn overlapping_runs_of_one_job_are_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT 1"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = JobRegistry::new(store.clone())
        .load_all()
        .await
        .into_iter()
        .next()
        .unwrap();

    let source = Arc::new(
        StaticSource::new(vec!["n"], vec![vec!["1"]])
            .with_batch_delay(Duration::from_millis(100)),
    );
    let runner = Arc::new(JobRunner::new(source, Arc::new(RunLedger::new(store.clone()))));
    let dispatcher = Dispatcher::new(2);

    for _ in 0..2 {
        let runner = Arc::clone(&runner);
        let trigger = trigger.clone();
        dispatcher
            .submit("dup".into(), async move {
                runner.execute(&trigger).await;
            })
            .await;
    }

    wait_until("both runs in flight", Duration::from_millis(500), || {
        dispatcher.available_permits() == 0
    })
    .await;
    dispatcher.drain().await;

    let stored = store.active_job(JobId::new(1)).await.unwrap().unwrap();
    assert!(stored.last_exec.is_some());
}
