//! SQLite config store.
//!
//! Persistent backend using sqlx with automatic schema migration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use super::{ConfigStore, JobRow, ScheduleRow, StoreError};
use crate::core::types::{JobId, ScheduleId};
use crate::ledger::LogEntry;

/// SQLite config store backend.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the store at the given database path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StoreError::Other(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory database (useful for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let schema = include_str!("../../migrations/001_initial_schema.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn timestamp_to_string(when: DateTime<Utc>) -> String {
    when.to_rfc3339()
}

fn string_to_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

type JobTuple = (i64, String, bool, String, String, Option<String>, Option<String>);

fn job_from_row(row: JobTuple) -> JobRow {
    JobRow {
        id: JobId::new(row.0),
        name: row.1,
        active: row.2,
        export_path: row.3,
        export_name: row.4,
        sql: row.5.unwrap_or_default(),
        last_exec: row.6.as_deref().and_then(string_to_timestamp),
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn active_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        let rows: Vec<JobTuple> = sqlx::query_as(
            "SELECT id, name, active, export_path, export_name, sql_text, last_exec \
             FROM jobs WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(rows.into_iter().map(job_from_row).collect())
    }

    async fn active_job(&self, id: JobId) -> Result<Option<JobRow>, StoreError> {
        let row: Option<JobTuple> = sqlx::query_as(
            "SELECT id, name, active, export_path, export_name, sql_text, last_exec \
             FROM jobs WHERE active = 1 AND id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(row.map(job_from_row))
    }

    async fn schedule_entries(&self, job_id: JobId) -> Result<Vec<ScheduleRow>, StoreError> {
        let rows: Vec<(i64, i64, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT id, job_id, weekday, start_time, end_time, repeat_minutes \
                 FROM schedule_entries WHERE job_id = ? ORDER BY id",
            )
            .bind(job_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ScheduleRow {
                id: ScheduleId::new(row.0),
                job_id: JobId::new(row.1),
                weekday: row.2,
                start_time: row.3,
                end_time: row.4,
                repeat_minutes: row.5,
            })
            .collect())
    }

    async fn set_last_exec(&self, job_id: JobId, when: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE jobs SET last_exec = ? WHERE id = ?")
            .bind(timestamp_to_string(when))
            .bind(job_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("job: {}", job_id)));
        }
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO run_logs (logged_at, level, source, job_id, user_name, message, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp_to_string(entry.timestamp))
        .bind(entry.level.as_str())
        .bind(&entry.source)
        .bind(entry.job_id.map(|id| id.as_i64()))
        .bind(&entry.user)
        .bind(&entry.message)
        .bind(entry.duration_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(())
    }
}
