//! Concurrent task-execution toolkit built on bounded queues.
//!
//! The crate provides a small set of composable concurrency components: a
//! capacity-bounded MPMC queue with an explicit closed state, a worker pool
//! with per-job failure containment, pipeline combinators (stages, fan-out,
//! fan-in), a fixed-window rate limiter, a circuit breaker, a counting
//! semaphore, a one-to-many broadcaster, and a shutdown coordinator that turns
//! a stop request into a confirmed drain-and-exit sequence.

mod macros;

pub mod breaker;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod limiter;
pub mod pipeline;
pub mod queue;
pub mod semaphore;
pub mod shutdown;
pub mod state;
pub mod types;
pub mod workers;
