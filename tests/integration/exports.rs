//! End-to-end export runs: real SQLite source to delimited file.

use exportd::{
    ConfigStore, ExportOutcome, InMemoryStore, JobId, JobRegistry, JobRunner, LogLevel, RunLedger,
    SqliteSource, TriggerDescriptor,
};
use std::sync::Arc;

use crate::common::{job, schedule};

/// Create a source database with a small people table.
fn seed_source_db(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("source.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, score REAL);
         INSERT INTO people VALUES (1, 'ada', 9.5);
         INSERT INTO people VALUES (2, 'bob; the builder', 7.0);
         INSERT INTO people VALUES (3, NULL, NULL);",
    )
    .unwrap();
    path
}

async fn first_trigger(store: Arc<InMemoryStore>) -> TriggerDescriptor {
    JobRegistry::new(store)
        .load_all()
        .await
        .into_iter()
        .next()
        .expect("seeded job should flatten to at least one trigger")
}

#[tokio::test]
async fn export_from_sqlite_source_writes_delimited_file() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = seed_source_db(dir.path());

    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT id, name, score FROM people ORDER BY id"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = first_trigger(store.clone()).await;
    let runner = JobRunner::new(
        Arc::new(SqliteSource::new(&source_path, 2)),
        Arc::new(RunLedger::new(store.clone())),
    );

    let outcome = runner.execute(&trigger).await;
    assert_eq!(outcome, ExportOutcome::Completed { rows: 3 });

    let content = std::fs::read_to_string(dir.path().join("job1.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "id;name;score");
    assert_eq!(lines[1], "1;ada;9.5");
    // Field containing the delimiter gets quoted.
    assert_eq!(lines[2], "2;\"bob; the builder\";7");
    // NULLs render as empty fields.
    assert_eq!(lines[3], "3;;");

    let stored = store.active_job(JobId::new(1)).await.unwrap().unwrap();
    assert!(stored.last_exec.is_some());
}

#[tokio::test]
async fn query_against_missing_table_fails_but_records_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = seed_source_db(dir.path());

    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT * FROM no_such_table"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = first_trigger(store.clone()).await;
    let runner = JobRunner::new(
        Arc::new(SqliteSource::new(&source_path, 100)),
        Arc::new(RunLedger::new(store.clone())),
    );

    let outcome = runner.execute(&trigger).await;
    assert!(matches!(outcome, ExportOutcome::Failed { .. }));
    assert!(!dir.path().join("job1.csv").exists());

    let stored = store.active_job(JobId::new(1)).await.unwrap().unwrap();
    assert!(stored.last_exec.is_some());

    let errors: Vec<_> = store
        .log_entries()
        .into_iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].job_id, Some(JobId::new(1)));
}

#[tokio::test]
async fn mutating_statement_never_reaches_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = seed_source_db(dir.path());

    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "DELETE FROM people"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = first_trigger(store.clone()).await;
    let runner = JobRunner::new(
        Arc::new(SqliteSource::new(&source_path, 100)),
        Arc::new(RunLedger::new(store.clone())),
    );

    let outcome = runner.execute(&trigger).await;
    assert!(matches!(outcome, ExportOutcome::Rejected { .. }));

    // No timestamp, no file, and the source rows are untouched.
    let stored = store.active_job(JobId::new(1)).await.unwrap().unwrap();
    assert!(stored.last_exec.is_none());
    assert!(!dir.path().join("job1.csv").exists());

    let conn = rusqlite::Connection::open(&source_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn durable_sink_failure_does_not_fail_the_export() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = seed_source_db(dir.path());

    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT id FROM people"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));
    store.fail_log_writes(true);

    let trigger = first_trigger(store.clone()).await;
    let ledger = Arc::new(RunLedger::new(store.clone()));
    let runner = JobRunner::new(
        Arc::new(SqliteSource::new(&source_path, 100)),
        Arc::clone(&ledger),
    );

    let outcome = runner.execute(&trigger).await;
    assert_eq!(outcome, ExportOutcome::Completed { rows: 3 });
    assert!(dir.path().join("job1.csv").exists());
    assert_eq!(ledger.sink_failures(), 1);
}

#[tokio::test]
async fn batched_fetch_exports_every_row_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE nums (n INTEGER);").unwrap();
    for n in 0..250 {
        conn.execute("INSERT INTO nums VALUES (?1)", [n]).unwrap();
    }

    let store = Arc::new(InMemoryStore::new());
    store.insert_job(job(1, dir.path(), "SELECT n FROM nums ORDER BY n"));
    store.insert_schedule(schedule(1, 1, "Mon", "08:00", None, None));

    let trigger = first_trigger(store.clone()).await;
    // Batch size far below the row count forces multiple fetches.
    let runner = JobRunner::new(
        Arc::new(SqliteSource::new(&path, 16)),
        Arc::new(RunLedger::new(store)),
    );

    let outcome = runner.execute(&trigger).await;
    assert_eq!(outcome, ExportOutcome::Completed { rows: 250 });

    let content = std::fs::read_to_string(dir.path().join("job1.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 251);
    assert_eq!(lines[1], "0");
    assert_eq!(lines[250], "249");
}
