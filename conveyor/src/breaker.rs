//! Circuit breaker isolating callers from a repeatedly failing operation.
//!
//! The breaker is a three-state machine. While closed, calls pass through and
//! consecutive failures are counted. Reaching the threshold opens the breaker:
//! calls are rejected without being attempted until the cooldown elapses, at which
//! point a single probe call runs half-open. A successful probe closes the breaker
//! and resets the count; a failed probe reopens it and restarts the cooldown.
//!
//! State checks, the wrapped invocation, and the bookkeeping all happen under one
//! async-mutex critical section, so concurrent callers observe a consistent state
//! and two half-open probes can never run at once. A rejection is reported as
//! [`ErrorKind::BreakerOpen`], always distinguishable from the wrapped operation's
//! own error.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::bail;
use crate::config::BreakerConfig;
use crate::error::{ConveyorResult, ErrorKind};

/// Observable breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// One probe call is in flight or about to be admitted.
    HalfOpen,
}

/// Mutable breaker state, guarded as one unit.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Snapshot of the breaker's state for inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current position in the state machine.
    pub state: CircuitState,
    /// Consecutive failures observed since the last success.
    pub failure_count: u32,
}

/// Failure-isolation wrapper around an arbitrary fallible async operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Creates a closed breaker tolerating `threshold` consecutive failures and
    /// cooling down for `cooldown` once open.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
            threshold,
            cooldown,
        }
    }

    /// Creates a breaker from a validated configuration.
    pub fn from_config(config: &BreakerConfig) -> ConveyorResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.threshold,
            Duration::from_millis(config.cooldown_ms),
        ))
    }

    /// Invokes `operation` through the breaker.
    ///
    /// While open and inside the cooldown, returns [`ErrorKind::BreakerOpen`]
    /// without invoking the operation. Otherwise the operation runs and its own
    /// result is passed through to the caller after bookkeeping.
    pub async fn call<F, Fut, T>(&self, operation: F) -> ConveyorResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConveyorResult<T>>,
    {
        let mut inner = self.inner.lock().await;

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure_at
                .is_some_and(|at| at.elapsed() > self.cooldown);
            if !cooled_down {
                bail!(
                    ErrorKind::BreakerOpen,
                    "circuit breaker is open, call not attempted"
                );
            }
            inner.state = CircuitState::HalfOpen;
        }

        // The lock is held across the await: this is what serializes probes.
        match operation().await {
            Ok(value) => {
                inner.failure_count = 0;
                inner.state = CircuitState::Closed;
                Ok(value)
            }
            Err(err) => {
                inner.failure_count += 1;
                inner.last_failure_at = Some(Instant::now());
                if inner.state == CircuitState::HalfOpen || inner.failure_count >= self.threshold {
                    inner.state = CircuitState::Open;
                }
                Err(err)
            }
        }
    }

    /// Returns a snapshot of the breaker's current state.
    pub async fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().await;
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
        }
    }
}
