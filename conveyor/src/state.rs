//! Shared mutable state behind opaque, race-free handles.
//!
//! Every structure here pairs its data with its synchronization so callers can
//! never lock-and-forget; the lock itself is never exposed. Writers take exclusive
//! access, read-heavy structures allow concurrent readers, and no reader ever
//! observes a partially-written entry. None of these handles is ever held while
//! another toolkit lock is taken.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Cloneable monotonic counter.
///
/// Used by components to publish progress (jobs succeeded, messages dropped)
/// without coordination between writers.
#[derive(Clone, Debug, Default)]
pub struct SharedCounter {
    value: Arc<AtomicU64>,
}

impl SharedCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to the counter.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `n` to the counter.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the current value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Cloneable read-heavy cache permitting concurrent readers and one writer.
pub struct SharedCache<K, V> {
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> SharedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Inserts or replaces an entry, returning the previous value if present.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value)
    }

    /// Returns a clone of the value for `key`, if present.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Removes the entry for `key`, returning its value if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for SharedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> fmt::Debug for SharedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("len", &self.len())
            .finish()
    }
}

/// Aggregated statistics for one named operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpStats {
    /// Number of recorded invocations.
    pub count: u64,
    /// Total recorded duration.
    pub total: Duration,
}

impl OpStats {
    /// Returns the mean duration per invocation, or zero when nothing was recorded.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// Cloneable per-operation duration metrics.
#[derive(Clone, Debug, Default)]
pub struct OpMetrics {
    operations: Arc<Mutex<HashMap<&'static str, OpStats>>>,
}

impl OpMetrics {
    /// Creates an empty metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one invocation of `name` taking `duration`.
    pub fn record(&self, name: &'static str, duration: Duration) {
        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stats = operations.entry(name).or_default();
        stats.count += 1;
        stats.total += duration;
    }

    /// Returns the statistics recorded for `name`, if any.
    pub fn stats(&self, name: &str) -> Option<OpStats> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Returns a snapshot of every recorded operation.
    pub fn snapshot(&self) -> HashMap<&'static str, OpStats> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
