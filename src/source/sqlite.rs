//! SQLite source backend.
//!
//! Uses rusqlite for lazy row stepping with dynamic value access: export
//! queries are arbitrary SQL, so column types are only known at runtime.
//! A blocking reader task steps the statement and pushes batches through a
//! small bounded channel, which is what bounds prefetch ahead of the writer.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

use super::{QuerySource, QueryStream, SourceError};

/// Number of in-flight batches between the reader and the consumer.
const BATCH_CHANNEL_BUFFER: usize = 2;

/// SQLite-backed query source.
pub struct SqliteSource {
    path: PathBuf,
    batch_size: usize,
}

impl SqliteSource {
    /// Create a source reading from the given database file.
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl QuerySource for SqliteSource {
    async fn open(&self, sql: &str) -> Result<Box<dyn QueryStream>, SourceError> {
        let (col_tx, col_rx) = oneshot::channel();
        let (batch_tx, batch_rx) = mpsc::channel(BATCH_CHANNEL_BUFFER);

        let path = self.path.clone();
        let sql = sql.to_string();
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || read_rows(path, sql, batch_size, col_tx, batch_tx));

        let columns = col_rx.await.map_err(|_| SourceError::Closed)??;
        Ok(Box::new(SqliteStream {
            columns,
            batches: batch_rx,
        }))
    }
}

struct SqliteStream {
    columns: Vec<String>,
    batches: mpsc::Receiver<Result<Vec<Vec<String>>, SourceError>>,
}

#[async_trait]
impl QueryStream for SqliteStream {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<Vec<String>>>, SourceError> {
        self.batches.recv().await.transpose()
    }
}

/// Blocking reader: prepares the statement, reports columns, then steps
/// rows into batches until exhaustion, error, or consumer hang-up.
fn read_rows(
    path: PathBuf,
    sql: String,
    batch_size: usize,
    col_tx: oneshot::Sender<Result<Vec<String>, SourceError>>,
    batch_tx: mpsc::Sender<Result<Vec<Vec<String>>, SourceError>>,
) {
    let conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = col_tx.send(Err(SourceError::Database(e.to_string())));
            return;
        }
    };

    let mut stmt = match conn.prepare(&sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = col_tx.send(Err(SourceError::Database(e.to_string())));
            return;
        }
    };

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();
    if col_tx.send(Ok(columns)).is_err() {
        return;
    }

    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = batch_tx.blocking_send(Err(SourceError::Database(e.to_string())));
            return;
        }
    };

    let mut batch = Vec::with_capacity(batch_size);
    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let mut record = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    record.push(render_value(row.get_ref(i)));
                }
                batch.push(record);
                if batch.len() >= batch_size {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    if batch_tx.blocking_send(Ok(full)).is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                if !batch.is_empty() {
                    let _ = batch_tx.blocking_send(Ok(batch));
                }
                return;
            }
            Err(e) => {
                let _ = batch_tx.blocking_send(Err(SourceError::Database(e.to_string())));
                return;
            }
        }
    }
}

/// Render a dynamically-typed SQLite value as export text.
fn render_value(value: Result<ValueRef<'_>, rusqlite::Error>) -> String {
    match value {
        Ok(ValueRef::Null) => String::new(),
        Ok(ValueRef::Integer(i)) => i.to_string(),
        Ok(ValueRef::Real(r)) => r.to_string(),
        Ok(ValueRef::Text(t)) => String::from_utf8_lossy(t).into_owned(),
        Ok(ValueRef::Blob(b)) => {
            let mut hex = String::with_capacity(b.len() * 2);
            for byte in b {
                let _ = write!(hex, "{:02x}", byte);
            }
            hex
        }
        Err(_) => String::new(),
    }
}
