//! Counting semaphore bounding the number of simultaneously active holders.
//!
//! Built directly on [`BoundedQueue`]: acquiring pushes a token into a queue whose
//! capacity equals the semaphore capacity (suspending once full), and releasing
//! takes a token back out. Fairness is weak: every suspended acquire eventually
//! succeeds as long as releases keep arriving, with no ordering guarantee beyond
//! the queue's wake-up order.

use crate::error::{ConveyorResult, ErrorKind};
use crate::queue::BoundedQueue;
use crate::shutdown::ShutdownRx;
use crate::conveyor_error;

/// Concurrency limiter with a fixed number of slots.
#[derive(Clone, Debug)]
pub struct Semaphore {
    tokens: BoundedQueue<()>,
}

impl Semaphore {
    /// Creates a semaphore with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a semaphore nobody can acquire is a
    /// configuration error at the callsite.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "semaphore capacity must be greater than 0");
        Self {
            tokens: BoundedQueue::new(capacity),
        }
    }

    /// Acquires a slot, suspending while all slots are held.
    ///
    /// The returned permit releases its slot when dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        match self.tokens.put(()).await {
            Ok(()) => SemaphorePermit { semaphore: self },
            // The token queue is private and never closed.
            Err(_) => unreachable!("semaphore token queue is never closed"),
        }
    }

    /// Acquires a slot, observing a shutdown signal at the suspension point.
    ///
    /// Returns [`ErrorKind::OperationCanceled`] if shutdown fires before a slot
    /// opens.
    pub async fn acquire_or_shutdown(
        &self,
        shutdown: &ShutdownRx,
    ) -> ConveyorResult<SemaphorePermit<'_>> {
        tokio::select! {
            permit = self.acquire() => Ok(permit),
            _ = shutdown.wait_for_shutdown() => {
                Err(conveyor_error!(
                    ErrorKind::OperationCanceled,
                    "semaphore acquire interrupted by shutdown"
                ))
            }
        }
    }

    /// Attempts to acquire a slot without suspending.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        match self.tokens.try_put(()) {
            Ok(()) => Some(SemaphorePermit { semaphore: self }),
            Err(_) => None,
        }
    }

    /// Returns the number of slots currently held.
    pub fn held(&self) -> usize {
        self.tokens.len()
    }

    /// Returns the total number of slots.
    pub fn capacity(&self) -> usize {
        self.tokens.capacity()
    }
}

/// Slot held on a [`Semaphore`], released on drop.
#[derive(Debug)]
#[must_use = "a permit frees its slot as soon as it is dropped"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        // A token is always buffered while this permit exists.
        let _ = self.semaphore.tokens.try_get();
    }
}
