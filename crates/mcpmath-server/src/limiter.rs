use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Why no slot was obtained.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("no execution slot became free before the deadline")]
    TimedOut,
    #[error("the limiter was shut down")]
    Closed,
}

/// One concurrency slot; the slot is released when the token is dropped.
#[derive(Debug)]
pub struct InFlightToken {
    _permit: OwnedSemaphorePermit,
}

/// Global ceiling on concurrently executing calls.
///
/// Shared by every transport and connection. Waiters are served in FIFO
/// order by the underlying semaphore.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a slot, giving up at `deadline`.
    pub async fn acquire_until(&self, deadline: Instant) -> Result<InFlightToken, AcquireError> {
        let acquire = self.semaphore.clone().acquire_owned();
        match tokio::time::timeout_at(deadline, acquire).await {
            Ok(Ok(permit)) => Ok(InFlightToken { _permit: permit }),
            Ok(Err(_)) => Err(AcquireError::Closed),
            Err(_) => Err(AcquireError::TimedOut),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Whether the limiter still hands out slots.
    pub fn is_responsive(&self) -> bool {
        !self.semaphore.is_closed()
    }

    /// Stops handing out slots; current and future waiters get `Closed`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
