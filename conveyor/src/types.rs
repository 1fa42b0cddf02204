//! Envelopes for work items flowing through pools and pipelines.

use crate::error::ConveyorResult;

/// A unit of work submitted to a pool.
///
/// The identifier travels with the payload so the matching [`TaskResult`] can be
/// correlated even though workers complete jobs out of submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<T> {
    /// Caller-assigned identifier, echoed back in the result.
    pub id: u64,
    /// The work item itself.
    pub payload: T,
}

impl<T> Job<T> {
    /// Creates a new job envelope.
    pub fn new(id: u64, payload: T) -> Self {
        Self { id, payload }
    }
}

/// The outcome of processing one [`Job`].
///
/// A pool emits exactly one result per consumed job, whether processing
/// succeeded, failed, or panicked.
#[derive(Debug)]
pub struct TaskResult<T> {
    /// Identifier of the job this result belongs to.
    pub job_id: u64,
    /// The processing outcome.
    pub output: ConveyorResult<T>,
}

impl<T> TaskResult<T> {
    /// Returns whether the job was processed successfully.
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }
}
