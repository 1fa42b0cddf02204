//! One-to-many message fan-out with per-subscriber pacing.
//!
//! Each subscriber owns a bounded queue and drains it at its own pace. Delivery is
//! strictly non-blocking: a subscriber whose queue is full misses that message,
//! and neither the publisher nor the other subscribers are ever stalled by a slow
//! consumer. A subscriber only ever receives messages broadcast after it joined.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::bail;
use crate::error::{ConveyorResult, ErrorKind};
use crate::queue::{BoundedQueue, QueueReader};

/// Subscriber registry, guarded as one unit.
struct Registry<M> {
    subscribers: HashMap<String, BoundedQueue<M>>,
    closed: bool,
}

/// One-to-many broadcaster over bounded subscriber queues.
pub struct Broadcaster<M> {
    registry: Mutex<Registry<M>>,
    subscriber_capacity: usize,
}

impl<M: Clone> Broadcaster<M> {
    /// Creates a broadcaster whose subscriber queues hold `subscriber_capacity`
    /// undelivered messages each.
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry {
                subscribers: HashMap::new(),
                closed: false,
            }),
            subscriber_capacity,
        }
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry<M>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber and returns the read-only view of its queue.
    ///
    /// Re-subscribing under an existing name replaces the previous subscription
    /// and closes its queue. Returns [`ErrorKind::InvalidState`] once the
    /// broadcaster is closed.
    pub fn subscribe(&self, name: &str) -> ConveyorResult<QueueReader<M>> {
        let mut registry = self.lock_registry();
        if registry.closed {
            bail!(
                ErrorKind::InvalidState,
                "subscribe on a closed broadcaster"
            );
        }

        let queue = BoundedQueue::new(self.subscriber_capacity);
        let reader = queue.reader();
        if let Some(previous) = registry.subscribers.insert(name.to_string(), queue) {
            warn!(subscriber = name, "replacing existing subscription");
            previous.close();
        }

        debug!(subscriber = name, "subscriber registered");
        Ok(reader)
    }

    /// Removes a subscriber, closing its queue.
    ///
    /// Unknown names are ignored; the broadcaster does not track past members.
    pub fn unsubscribe(&self, name: &str) {
        let queue = self.lock_registry().subscribers.remove(name);
        if let Some(queue) = queue {
            debug!(subscriber = name, "subscriber removed");
            queue.close();
        }
    }

    /// Delivers `message` to every subscriber whose queue has room.
    ///
    /// Returns the number of subscribers that received the message. Subscribers
    /// with full queues miss this message only; delivery to the others proceeds.
    /// Returns [`ErrorKind::InvalidState`] once the broadcaster is closed.
    pub fn broadcast(&self, message: M) -> ConveyorResult<usize> {
        let registry = self.lock_registry();
        if registry.closed {
            bail!(
                ErrorKind::InvalidState,
                "broadcast on a closed broadcaster"
            );
        }

        let mut delivered = 0;
        for (name, queue) in &registry.subscribers {
            match queue.try_put(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(subscriber = name.as_str(), "subscriber queue full, message dropped");
                }
            }
        }

        Ok(delivered)
    }

    /// Stops accepting broadcasts and closes every subscriber queue exactly once.
    ///
    /// Returns [`ErrorKind::InvalidState`] if the broadcaster was already closed.
    pub fn close(&self) -> ConveyorResult<()> {
        let mut registry = self.lock_registry();
        if registry.closed {
            bail!(ErrorKind::InvalidState, "broadcaster closed twice");
        }
        registry.closed = true;

        for (name, queue) in registry.subscribers.drain() {
            debug!(subscriber = name.as_str(), "closing subscriber queue");
            queue.close();
        }

        Ok(())
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_registry().subscribers.len()
    }
}

impl<M: Clone> fmt::Debug for Broadcaster<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock_registry();
        f.debug_struct("Broadcaster")
            .field("subscribers", &registry.subscribers.len())
            .field("closed", &registry.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_with_room_receives_the_message() {
        let broadcaster = Broadcaster::new(4);
        let a = broadcaster.subscribe("a").expect("broadcaster is open");
        let b = broadcaster.subscribe("b").expect("broadcaster is open");

        let delivered = broadcaster
            .broadcast("hello")
            .expect("broadcaster is open");
        assert_eq!(delivered, 2);

        assert_eq!(a.get().await, Some("hello"));
        assert_eq!(b.get().await, Some("hello"));
    }

    #[tokio::test]
    async fn slow_subscriber_misses_messages_without_stalling_others() {
        let broadcaster = Broadcaster::new(1);
        let slow = broadcaster.subscribe("slow").expect("broadcaster is open");
        let fast = broadcaster.subscribe("fast").expect("broadcaster is open");

        assert_eq!(broadcaster.broadcast(1).expect("open"), 2);
        // The slow subscriber's queue is now full; it misses the second message.
        assert_eq!(fast.get().await, Some(1));
        assert_eq!(broadcaster.broadcast(2).expect("open"), 1);

        assert_eq!(fast.get().await, Some(2));
        assert_eq!(slow.get().await, Some(1));
        assert!(slow.is_empty());
    }

    #[tokio::test]
    async fn subscribers_never_see_messages_sent_before_joining() {
        let broadcaster = Broadcaster::new(4);
        let early = broadcaster.subscribe("early").expect("broadcaster is open");
        broadcaster.broadcast(1).expect("open");

        let late = broadcaster.subscribe("late").expect("broadcaster is open");
        broadcaster.broadcast(2).expect("open");
        broadcaster.close().expect("first close succeeds");

        assert_eq!(early.get().await, Some(1));
        assert_eq!(early.get().await, Some(2));
        assert_eq!(early.get().await, None);

        assert_eq!(late.get().await, Some(2));
        assert_eq!(late.get().await, None);
    }

    #[tokio::test]
    async fn close_ends_every_subscriber_stream() {
        let broadcaster: Broadcaster<u8> = Broadcaster::new(2);
        let reader = broadcaster.subscribe("a").expect("broadcaster is open");
        broadcaster.close().expect("first close succeeds");

        assert_eq!(reader.get().await, None);
        assert!(broadcaster.broadcast(1).is_err());
        assert!(broadcaster.subscribe("b").is_err());
        let err = broadcaster.close().expect_err("second close is rejected");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn resubscribing_replaces_the_previous_queue() {
        let broadcaster = Broadcaster::new(2);
        let first = broadcaster.subscribe("a").expect("broadcaster is open");
        let second = broadcaster.subscribe("a").expect("broadcaster is open");
        assert_eq!(broadcaster.subscriber_count(), 1);

        // The replaced queue is closed and receives nothing further.
        assert_eq!(first.get().await, None);

        broadcaster.broadcast(9).expect("open");
        assert_eq!(second.get().await, Some(9));
    }

    #[tokio::test]
    async fn unsubscribe_closes_only_that_queue() {
        let broadcaster = Broadcaster::new(2);
        let a = broadcaster.subscribe("a").expect("broadcaster is open");
        let b = broadcaster.subscribe("b").expect("broadcaster is open");

        broadcaster.unsubscribe("a");
        assert_eq!(a.get().await, None);

        assert_eq!(broadcaster.broadcast(3).expect("open"), 1);
        assert_eq!(b.get().await, Some(3));
    }
}
