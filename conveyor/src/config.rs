//! Configuration types for toolkit components.
//!
//! Each component with tunable behavior has a serde-derived config struct with
//! sensible defaults and a `validate` method. Construction from a config is
//! explicit; the toolkit holds no process-wide mutable state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("`{field}` is invalid: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: &'static str,
    },
}

/// Bounded queue configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum number of buffered items. Zero means synchronous hand-off.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl QueueConfig {
    /// Default queue capacity.
    pub const DEFAULT_CAPACITY: usize = 64;
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    QueueConfig::DEFAULT_CAPACITY
}

/// Worker pool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Number of persistent workers draining the job queue.
    #[serde(default = "default_pool_workers")]
    pub workers: usize,
    /// Capacity of the job queue feeding the workers.
    #[serde(default = "default_job_queue_capacity")]
    pub job_queue_capacity: usize,
    /// Capacity of the result queue filled by the workers.
    #[serde(default = "default_result_queue_capacity")]
    pub result_queue_capacity: usize,
}

impl PoolConfig {
    /// Default worker count.
    pub const DEFAULT_WORKERS: usize = 4;

    /// Default job queue capacity.
    pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 64;

    /// Default result queue capacity.
    pub const DEFAULT_RESULT_QUEUE_CAPACITY: usize = 64;

    /// Validates pool configuration settings.
    ///
    /// Ensures the worker count is non-zero. Queue capacities may be zero, which
    /// selects synchronous hand-off semantics.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "pool.workers",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_pool_workers(),
            job_queue_capacity: default_job_queue_capacity(),
            result_queue_capacity: default_result_queue_capacity(),
        }
    }
}

fn default_pool_workers() -> usize {
    PoolConfig::DEFAULT_WORKERS
}

fn default_job_queue_capacity() -> usize {
    PoolConfig::DEFAULT_JOB_QUEUE_CAPACITY
}

fn default_result_queue_capacity() -> usize {
    PoolConfig::DEFAULT_RESULT_QUEUE_CAPACITY
}

/// Fixed-window rate limiter configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LimiterConfig {
    /// Maximum number of permitted calls per window.
    #[serde(default = "default_limiter_limit")]
    pub limit: u32,
    /// Window length in milliseconds.
    #[serde(default = "default_limiter_window_ms")]
    pub window_ms: u64,
}

impl LimiterConfig {
    /// Default number of permitted calls per window.
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Default window length in milliseconds.
    pub const DEFAULT_WINDOW_MS: u64 = 1_000;

    /// Validates limiter configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "limiter.limit",
                constraint: "must be greater than 0",
            });
        }
        if self.window_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "limiter.window_ms",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            limit: default_limiter_limit(),
            window_ms: default_limiter_window_ms(),
        }
    }
}

fn default_limiter_limit() -> u32 {
    LimiterConfig::DEFAULT_LIMIT
}

fn default_limiter_window_ms() -> u64 {
    LimiterConfig::DEFAULT_WINDOW_MS
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BreakerConfig {
    /// Consecutive failures tolerated before the breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,
    /// Cooldown in milliseconds before an open breaker admits a probe call.
    #[serde(default = "default_breaker_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl BreakerConfig {
    /// Default failure threshold.
    pub const DEFAULT_THRESHOLD: u32 = 5;

    /// Default cooldown in milliseconds.
    pub const DEFAULT_COOLDOWN_MS: u64 = 30_000;

    /// Validates breaker configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.threshold == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "breaker.threshold",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_breaker_threshold(),
            cooldown_ms: default_breaker_cooldown_ms(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    BreakerConfig::DEFAULT_THRESHOLD
}

fn default_breaker_cooldown_ms() -> u64 {
    BreakerConfig::DEFAULT_COOLDOWN_MS
}
