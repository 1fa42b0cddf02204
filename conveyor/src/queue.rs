//! Capacity-bounded MPMC FIFO queue with an explicit closed terminal state.
//!
//! [`BoundedQueue`] is the substrate every other toolkit component is built on and
//! the only primitive allowed to suspend. Producers suspend when the queue is full,
//! consumers suspend when it is empty, and closing the queue is the cooperative
//! end-of-stream signal: buffered items remain consumable after close, and `get`
//! reports `None` only once the queue is both closed and drained.
//!
//! A queue with capacity zero performs synchronous hand-off: `put` suspends until a
//! consumer is waiting to take the item, mirroring an unbuffered channel.
//!
//! Blocking is implemented with a short-held mutex around the buffer plus two
//! [`Notify`] wake lists. Waiters register interest with [`Notified::enable`]
//! before re-checking state under the lock, so a wake-up between the check and
//! the await is never lost.
//!
//! [`Notified::enable`]: tokio::sync::futures::Notified::enable

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::config::QueueConfig;
use crate::error::{ConveyorResult, ErrorKind};
use crate::shutdown::{ShutdownResult, ShutdownRx};
use crate::{bail, conveyor_error};

/// Cloneable handle to a bounded FIFO queue.
///
/// All clones operate on the same underlying queue; typically one set of clones is
/// held by producers and another by consumers. Exactly one owner must call
/// [`BoundedQueue::close`] exactly once.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    /// Woken when a slot may have opened or the queue closed.
    space: Notify,
    /// Woken when an item may be available or the queue closed.
    items: Notify,
}

struct State<T> {
    buf: VecDeque<T>,
    capacity: usize,
    closed: bool,
    /// Consumers currently parked in `get`. For capacity-zero queues each parked
    /// consumer grants one rendezvous slot to producers.
    waiting_getters: usize,
}

impl<T> State<T> {
    fn has_space(&self) -> bool {
        if self.capacity > 0 {
            self.buf.len() < self.capacity
        } else {
            self.buf.len() < self.waiting_getters
        }
    }
}

/// Decrements the parked-consumer count when a `get` waiter unwinds, including
/// when its future is dropped mid-wait by `select!`.
struct WaitingGetter<'a, T> {
    inner: &'a Inner<T>,
}

impl<T> Drop for WaitingGetter<'_, T> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        state.waiting_getters -= 1;
    }
}

impl<T> Inner<T> {
    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        // The state mutex is only held for push/pop bookkeeping, which cannot
        // panic, so a poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a new open queue with the given capacity.
    ///
    /// Capacity zero creates a rendezvous queue: `put` suspends until a matching
    /// `get` is waiting.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    buf: VecDeque::with_capacity(capacity),
                    capacity,
                    closed: false,
                    waiting_getters: 0,
                }),
                space: Notify::new(),
                items: Notify::new(),
            }),
        }
    }

    /// Creates a new open queue sized from `config`.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Inserts an item, suspending while the queue is at capacity.
    ///
    /// Returns [`ErrorKind::QueueClosed`] if the queue was closed before the item
    /// could be inserted; the item is dropped in that case.
    pub async fn put(&self, item: T) -> ConveyorResult<()> {
        let mut item = Some(item);

        loop {
            let notified = self.inner.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock_state();
                if state.closed {
                    bail!(ErrorKind::QueueClosed, "put on a closed queue");
                }
                if state.has_space() {
                    state
                        .buf
                        .push_back(item.take().expect("item is present until pushed"));
                    self.inner.items.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Inserts an item, observing a shutdown signal at the suspension point.
    ///
    /// Returns [`ErrorKind::OperationCanceled`] if shutdown fires first; the item
    /// is dropped in that case.
    pub async fn put_or_shutdown(&self, item: T, shutdown: &ShutdownRx) -> ConveyorResult<()> {
        tokio::select! {
            outcome = self.put(item) => outcome,
            _ = shutdown.wait_for_shutdown() => {
                Err(conveyor_error!(
                    ErrorKind::OperationCanceled,
                    "put interrupted by shutdown"
                ))
            }
        }
    }

    /// Attempts to insert an item without suspending.
    ///
    /// Returns [`ErrorKind::QueueClosed`] if the queue is closed, or
    /// [`ErrorKind::QueueFull`] if no slot is available right now.
    pub fn try_put(&self, item: T) -> ConveyorResult<()> {
        let mut state = self.inner.lock_state();
        if state.closed {
            bail!(ErrorKind::QueueClosed, "put on a closed queue");
        }
        if !state.has_space() {
            bail!(ErrorKind::QueueFull, "queue is at capacity");
        }

        state.buf.push_back(item);
        self.inner.items.notify_one();
        Ok(())
    }

    /// Removes the oldest item, suspending while the queue is empty and open.
    ///
    /// Returns `None` only once the queue is closed and fully drained; buffered
    /// items are always yielded first.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock_state();
                if let Some(item) = state.buf.pop_front() {
                    self.inner.space.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }

                state.waiting_getters += 1;
                if state.capacity == 0 {
                    // A parked consumer opens one rendezvous slot.
                    self.inner.space.notify_one();
                }
            }

            let unpark = WaitingGetter { inner: &self.inner };
            notified.await;
            drop(unpark);
        }
    }

    /// Removes the oldest item, observing a shutdown signal at the suspension point.
    ///
    /// Returns [`ErrorKind::OperationCanceled`] if shutdown fires before an item or
    /// closure is observed.
    pub async fn get_or_shutdown(&self, shutdown: &ShutdownRx) -> ConveyorResult<Option<T>> {
        tokio::select! {
            item = self.get() => Ok(item),
            _ = shutdown.wait_for_shutdown() => {
                Err(conveyor_error!(
                    ErrorKind::OperationCanceled,
                    "get interrupted by shutdown"
                ))
            }
        }
    }

    /// Attempts to remove the oldest item without suspending.
    pub fn try_get(&self) -> Option<T> {
        let mut state = self.inner.lock_state();
        let item = state.buf.pop_front()?;
        self.inner.space.notify_one();
        Some(item)
    }

    /// Collects every remaining item until the queue closes or shutdown fires.
    ///
    /// On shutdown the items gathered so far are returned in the `Shutdown`
    /// variant so no in-flight work is silently discarded.
    pub async fn drain_or_shutdown(&self, shutdown: &ShutdownRx) -> ShutdownResult<Vec<T>, Vec<T>> {
        let mut items = Vec::new();

        loop {
            tokio::select! {
                item = self.get() => match item {
                    Some(item) => items.push(item),
                    None => return ShutdownResult::Ok(items),
                },
                _ = shutdown.wait_for_shutdown() => {
                    return ShutdownResult::Shutdown(items);
                }
            }
        }
    }

    /// Closes the queue.
    ///
    /// Pending and future `put`s fail with [`ErrorKind::QueueClosed`]; consumers
    /// drain buffered items and then observe end-of-stream.
    ///
    /// # Panics
    ///
    /// Panics if called on an already-closed queue. Closing is the designated
    /// owner's responsibility, exactly once; a double close is a programming error
    /// and not recoverable at runtime.
    pub fn close(&self) {
        {
            let mut state = self.inner.lock_state();
            assert!(!state.closed, "BoundedQueue closed twice");
            state.closed = true;
        }

        self.inner.items.notify_waiters();
        self.inner.space.notify_waiters();
    }

    /// Returns a read-only view of this queue for consumers.
    pub fn reader(&self) -> QueueReader<T> {
        QueueReader {
            queue: self.clone(),
        }
    }

    /// Returns the number of currently buffered items.
    pub fn len(&self) -> usize {
        self.inner.lock_state().buf.len()
    }

    /// Returns whether the queue holds no buffered items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock_state().capacity
    }

    /// Returns whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("BoundedQueue")
            .field("len", &state.buf.len())
            .field("capacity", &state.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Read-only view of a [`BoundedQueue`].
///
/// Handed to consumers that must not produce into or close the queue, such as
/// broadcast subscribers.
#[derive(Clone, Debug)]
pub struct QueueReader<T> {
    queue: BoundedQueue<T>,
}

impl<T> QueueReader<T> {
    /// Removes the oldest item, suspending while the queue is empty and open.
    pub async fn get(&self) -> Option<T> {
        self.queue.get().await
    }

    /// Removes the oldest item, observing a shutdown signal at the suspension point.
    pub async fn get_or_shutdown(&self, shutdown: &ShutdownRx) -> ConveyorResult<Option<T>> {
        self.queue.get_or_shutdown(shutdown).await
    }

    /// Attempts to remove the oldest item without suspending.
    pub fn try_get(&self) -> Option<T> {
        self.queue.try_get()
    }

    /// Collects every remaining item until the queue closes or shutdown fires.
    pub async fn drain_or_shutdown(&self, shutdown: &ShutdownRx) -> ShutdownResult<Vec<T>, Vec<T>> {
        self.queue.drain_or_shutdown(shutdown).await
    }

    /// Returns the number of currently buffered items.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether the queue holds no buffered items.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}
