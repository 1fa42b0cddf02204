//! Rate limiting in two backpressure flavors.
//!
//! [`RateLimiter`] is a fixed-window counter: `allow` answers immediately and a
//! `false` tells the caller to back off. [`Pacer`] absorbs the wait itself: `wait`
//! suspends until the next tick fires, releasing callers at a steady rate. Fixed
//! windows trade burst smoothing for O(1) state; callers needing smoother pacing
//! wrap the limiter or use the pacer.
//!
//! Both types use the tokio clock, so tests drive them deterministically with
//! paused time.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval};

use crate::config::LimiterConfig;
use crate::error::ConveyorResult;

/// State of the current window, guarded as one unit.
#[derive(Debug)]
struct Window {
    count: u32,
    window_start: Instant,
}

/// Fixed-window rate limiter.
///
/// A denied call is normal control flow, not an error.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<Window>,
    limit: u32,
    window_len: Duration,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` calls per `window_len`.
    pub fn new(limit: u32, window_len: Duration) -> Self {
        Self {
            window: Mutex::new(Window {
                count: 0,
                window_start: Instant::now(),
            }),
            limit,
            window_len,
        }
    }

    /// Creates a limiter from a validated configuration.
    pub fn from_config(config: &LimiterConfig) -> ConveyorResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.limit,
            Duration::from_millis(config.window_ms),
        ))
    }

    /// Returns whether the caller may proceed, consuming one slot if so.
    ///
    /// The window resets lazily: the first call after the window elapses starts a
    /// fresh one.
    pub fn allow(&self) -> bool {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        if now.duration_since(window.window_start) >= self.window_len {
            window.count = 0;
            window.window_start = now;
        }

        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Returns the configured per-window limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Tick-driven pacer that suspends callers instead of rejecting them.
///
/// Each `wait` resolves on its own tick, so concurrent callers are released one
/// per period in arrival order.
#[derive(Debug)]
pub struct Pacer {
    ticker: tokio::sync::Mutex<Interval>,
}

impl Pacer {
    /// Creates a pacer releasing one caller per `period`.
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval(period);
        // Skipping bursts after a stall keeps the release rate steady.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker: tokio::sync::Mutex::new(ticker),
        }
    }

    /// Suspends until the next tick fires.
    pub async fn wait(&self) {
        self.ticker.lock().await.tick().await;
    }
}
