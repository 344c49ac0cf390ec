use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::executor::ExecutionError;

/// Caps how many runs of one process are in flight at once.
#[derive(Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ExecutionError> {
        // Only fails once the semaphore is closed, which `close` does on shutdown.
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutionError::Cancelled)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wakes every waiter with [`ExecutionError::Cancelled`].
    pub fn close(&self) {
        self.semaphore.close();
    }
}
