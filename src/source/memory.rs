//! Static in-memory source for tests.

use async_trait::async_trait;
use std::time::Duration;

use super::{QuerySource, QueryStream, SourceError};

/// A source that serves a fixed result set regardless of the SQL text.
///
/// Optional knobs let tests inject an open failure or slow the stream down
/// to hold a worker slot.
pub struct StaticSource {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    batch_size: usize,
    fail_open: Option<String>,
    batch_delay: Option<Duration>,
}

impl StaticSource {
    /// Create a source serving the given columns and rows.
    pub fn new(columns: Vec<&str>, rows: Vec<Vec<&str>>) -> Self {
        Self {
            columns: columns.into_iter().map(String::from).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
            batch_size: 100,
            fail_open: None,
            batch_delay: None,
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fail every `open` call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            batch_size: 1,
            fail_open: Some(message.into()),
            batch_delay: None,
        }
    }

    /// Sleep before yielding each batch, to simulate a long-running export.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }
}

#[async_trait]
impl QuerySource for StaticSource {
    async fn open(&self, _sql: &str) -> Result<Box<dyn QueryStream>, SourceError> {
        if let Some(message) = &self.fail_open {
            return Err(SourceError::Database(message.clone()));
        }
        Ok(Box::new(StaticStream {
            columns: self.columns.clone(),
            remaining: self.rows.clone(),
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
        }))
    }
}

struct StaticStream {
    columns: Vec<String>,
    remaining: Vec<Vec<String>>,
    batch_size: usize,
    batch_delay: Option<Duration>,
}

#[async_trait]
impl QueryStream for StaticStream {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<Vec<String>>>, SourceError> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        let take = self.batch_size.min(self.remaining.len());
        let rest = self.remaining.split_off(take);
        let batch = std::mem::replace(&mut self.remaining, rest);
        Ok(Some(batch))
    }
}
