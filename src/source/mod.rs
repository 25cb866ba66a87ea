//! Source-database abstraction for export queries.
//!
//! The source endpoint runs arbitrary read-validated SQL, so result values
//! are untyped: a stream yields column names up front and then stringified
//! rows in bounded batches. Each opened stream owns its own connection;
//! connections are never shared across workers.

mod memory;
mod sqlite;

pub use memory::StaticSource;
pub use sqlite::SqliteSource;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the source endpoint.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Driver-level database error.
    #[error("source database error: {0}")]
    Database(String),

    /// The streaming side went away before the query finished.
    #[error("source stream closed unexpectedly")]
    Closed,
}

/// A connection factory for read-only export queries.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Execute `sql` and return a batched result stream.
    ///
    /// The statement is prepared eagerly, so syntax and connectivity errors
    /// surface here rather than mid-stream.
    async fn open(&self, sql: &str) -> Result<Box<dyn QueryStream>, SourceError>;
}

/// A streamed query result: column names first, then row batches.
#[async_trait]
pub trait QueryStream: Send {
    /// Column names, available before any row is fetched.
    fn columns(&self) -> &[String];

    /// Fetch the next batch of rows, or None when the result is exhausted.
    ///
    /// Batch size is bounded by the source's configured prefetch.
    async fn next_batch(&mut self) -> Result<Option<Vec<Vec<String>>>, SourceError>;
}
