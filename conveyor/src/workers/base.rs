use std::future::Future;

use crate::error::ConveyorResult;

/// Trait for background workers in the toolkit.
///
/// [`Worker`] defines the interface for starting background processing units.
/// Starting a worker consumes it and returns a handle that can be used to
/// observe progress and wait for completion.
///
/// The generic parameter `H` represents the handle type returned when the worker
/// starts, and `S` represents the state type accessible through the handle.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Starts the worker and returns a handle for monitoring its execution.
    ///
    /// This method begins background processing and returns immediately with a
    /// handle that can be used to observe progress and wait for completion.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle for monitoring a running worker.
///
/// [`WorkerHandle`] provides access to worker state and enables waiting for
/// completion. The state is a snapshot and carries no guarantee about the
/// worker's liveness; the worker may finish while a state value is held.
///
/// The generic parameter `S` represents the type of state accessible through
/// this handle.
pub trait WorkerHandle<S> {
    /// Returns the current state of the worker.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns the final result.
    ///
    /// The handle is consumed by this operation.
    fn wait(self) -> impl Future<Output = ConveyorResult<()>> + Send;
}
