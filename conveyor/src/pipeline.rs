//! Queue-to-queue composition: transform stages, fan-out, and fan-in.
//!
//! Each combinator spawns the tasks it needs and hands back the queue(s) it
//! owns. Closure propagates downstream automatically: a stage closes its output
//! once its input is drained and closed, fan-out closes every branch once the
//! source closes, and fan-in closes the merged output only after every input
//! has been fully drained and closed.
//!
//! The returned queues are owned by the combinator tasks; callers consume from
//! them but must not close them.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::queue::BoundedQueue;

/// Routing policy for [`fan_out`].
#[derive(Clone)]
pub enum Partition<T> {
    /// Items rotate across the outputs in order.
    RoundRobin,
    /// Items are routed by key; equal keys always land on the same output.
    Key(Arc<dyn Fn(&T) -> usize + Send + Sync>),
}

impl<T> Partition<T> {
    /// Creates a key-partitioning policy from a key function.
    ///
    /// The returned index is taken modulo the number of outputs.
    pub fn by_key<F>(key: F) -> Self
    where
        F: Fn(&T) -> usize + Send + Sync + 'static,
    {
        Partition::Key(Arc::new(key))
    }
}

impl<T> std::fmt::Debug for Partition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::RoundRobin => write!(f, "RoundRobin"),
            Partition::Key(_) => write!(f, "Key"),
        }
    }
}

/// Spawns a transform stage reading from `input` and returns its output queue.
///
/// The stage applies `transform` to every item until `input` is drained and
/// closed, then closes the output, so closure ripples through a chain of
/// stages without any external coordination.
pub fn stage<I, O, F, Fut>(
    input: BoundedQueue<I>,
    capacity: usize,
    mut transform: F,
) -> BoundedQueue<O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = O> + Send,
{
    let output = BoundedQueue::new(capacity);

    let stage_output = output.clone();
    tokio::spawn(async move {
        while let Some(item) = input.get().await {
            let item = transform(item).await;
            if stage_output.put(item).await.is_err() {
                // Output closed out from under us; the stage owns it, so this
                // only happens on caller misuse. Stop pulling from the input.
                debug!("stage output closed early, abandoning input");
                return;
            }
        }

        stage_output.close();
    });

    output
}

/// Spawns a splitter distributing `input` across `outputs` queues.
///
/// Items are routed per `partition`. All outputs close once the input is
/// drained and closed.
///
/// # Panics
///
/// Panics if `outputs` is zero.
pub fn fan_out<T>(
    input: BoundedQueue<T>,
    outputs: usize,
    capacity: usize,
    partition: Partition<T>,
) -> Vec<BoundedQueue<T>>
where
    T: Send + 'static,
{
    assert!(outputs > 0, "fan_out requires at least one output");

    let queues: Vec<BoundedQueue<T>> = (0..outputs).map(|_| BoundedQueue::new(capacity)).collect();

    let branches = queues.clone();
    tokio::spawn(async move {
        let mut next = 0;
        while let Some(item) = input.get().await {
            let index = match &partition {
                Partition::RoundRobin => {
                    let index = next;
                    next = (next + 1) % branches.len();
                    index
                }
                Partition::Key(key) => key(&item) % branches.len(),
            };

            if branches[index].put(item).await.is_err() {
                debug!(branch = index, "fan-out branch closed early, stopping split");
                break;
            }
        }

        for branch in &branches {
            if !branch.is_closed() {
                branch.close();
            }
        }
    });

    queues
}

/// Spawns a merger combining `inputs` into a single output queue.
///
/// One forwarder task per input moves items into the shared output; a
/// coordinator joins all forwarders and then closes the output exactly once.
/// The output is closed iff every input has been fully drained and closed, and
/// no item is lost or duplicated across the merge.
pub fn fan_in<T>(inputs: Vec<BoundedQueue<T>>, capacity: usize) -> BoundedQueue<T>
where
    T: Send + 'static,
{
    let output = BoundedQueue::new(capacity);

    let merged = output.clone();
    tokio::spawn(async move {
        let mut forwarders = JoinSet::new();
        for input in inputs {
            let merged = merged.clone();
            forwarders.spawn(async move {
                while let Some(item) = input.get().await {
                    if merged.put(item).await.is_err() {
                        debug!("fan-in output closed early, forwarder stopping");
                        return;
                    }
                }
            });
        }

        // Counting join: only after every forwarder has finished can the
        // output be closed, exactly once, by this coordinator.
        while forwarders.join_next().await.is_some() {}
        merged.close();
        debug!("fan-in inputs exhausted, output closed");
    });

    output
}
