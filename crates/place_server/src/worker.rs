//! Bounded pool for blocking storage work.

use crate::error::{ServerError, ServerResult};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs blocking closures off the async runtime, at most `threads` at a time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    threads: usize,
}

impl WorkerPool {
    /// Creates a pool allowing `threads` concurrent jobs.
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        Self {
            permits: Arc::new(Semaphore::new(threads)),
            threads,
        }
    }

    /// Configured concurrency.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Jobs that could start right now without waiting.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `job` on a blocking thread and returns its result.
    ///
    /// The permit travels with the job, so a caller that stops waiting
    /// does not free a slot until the job has actually finished.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`ServerError::Worker`] if the job
    /// panicked or the pool is shut down.
    pub async fn run<T, F>(&self, job: F) -> ServerResult<T>
    where
        F: FnOnce() -> ServerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Worker("worker pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ServerError::Worker(format!("blocking job failed: {e}")))?
    }
}
