//! Bounded dispatcher for export executions.
//!
//! Submissions return immediately; each submitted future runs on its own
//! tokio task and waits on a shared semaphore before doing work, so at
//! most `max_workers` exports touch the source database at once while
//! late arrivals queue without blocking the scheduling loop.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of concurrent export workers.
pub const DEFAULT_MAX_WORKERS: usize = 6;

/// Dispatcher running submitted futures under a concurrency cap.
pub struct Dispatcher {
    max_workers: usize,
    semaphore: Arc<Semaphore>,
    accepting: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher with the given worker cap (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            accepting: AtomicBool::new(true),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Get the worker cap.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of idle worker slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Submit a future for execution. Returns as soon as the task is
    /// spawned; the permit is taken inside the spawned task so a full
    /// worker pool never stalls the caller.
    ///
    /// Returns false if the dispatcher is draining and refused the work.
    pub async fn submit<F>(&self, label: String, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting.load(Ordering::SeqCst) {
            warn!(job = %label, "Dispatcher is draining; refusing submission");
            return false;
        }
        let semaphore = Arc::clone(&self.semaphore);
        let handle = tokio::spawn(async move {
            // Semaphore is never closed while the dispatcher lives.
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            debug!(job = %label, "Worker slot acquired");
            fut.await;
        });

        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        true
    }

    /// Number of submitted tasks not yet finished.
    pub async fn in_flight(&self) -> usize {
        let handles = self.handles.lock().await;
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Stop accepting submissions and wait for every in-flight task.
    ///
    /// In-flight exports run to completion; there is no timeout here, a
    /// long-running export holds shutdown until it finishes.
    pub async fn drain(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().await;
            guard.drain(..).collect()
        };
        if !handles.is_empty() {
            info!(tasks = handles.len(), "Draining dispatcher");
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Export task panicked during drain");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}
