//! Common test utilities shared across integration tests.

use exportd::{JobId, JobRow, ScheduleId, ScheduleRow};
use std::path::Path;
use std::time::Duration;

/// Build an active job row writing into `dir`.
pub fn job(id: i64, dir: &Path, sql: &str) -> JobRow {
    JobRow {
        id: JobId::new(id),
        name: format!("job{}", id),
        active: true,
        export_path: dir.to_string_lossy().into_owned(),
        export_name: format!("job{}", id),
        sql: sql.to_string(),
        last_exec: None,
    }
}

/// Build a schedule entry row.
pub fn schedule(
    id: i64,
    job_id: i64,
    weekday: &str,
    start: &str,
    end: Option<&str>,
    every: Option<&str>,
) -> ScheduleRow {
    ScheduleRow {
        id: ScheduleId::new(id),
        job_id: JobId::new(job_id),
        weekday: weekday.to_string(),
        start_time: start.to_string(),
        end_time: end.map(String::from),
        repeat_minutes: every.map(String::from),
    }
}

/// Poll a condition until it holds or the timeout elapses.
///
/// More reliable than fixed sleeps since execution time can vary. Polls
/// every 10ms and panics with the given description on timeout.
pub async fn wait_until<F: Fn() -> bool>(what: &str, timeout: Duration, condition: F) {
    let start = tokio::time::Instant::now();
    loop {
        if condition() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("Timeout waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
