//! Ordered stop sequencing for long-running loops.
//!
//! A [`ShutdownCoordinator`] owns one managed loop and the shutdown channel it
//! listens on. [`stop`](ShutdownCoordinator::stop) fires the signal and then
//! waits for the loop to confirm its exit by joining it, so teardown is a
//! handshake rather than a fire-and-forget: when `stop` returns, the loop has
//! fully exited.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::conveyor_error;
use crate::error::{ConveyorResult, ErrorKind};
use crate::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};

/// Owns a managed loop and drives its confirmed shutdown.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: ShutdownTx,
    handle: Mutex<Option<JoinHandle<ConveyorResult<()>>>>,
}

impl ShutdownCoordinator {
    /// Spawns a caller-supplied loop under this coordinator's control.
    ///
    /// The loop receives a [`ShutdownRx`] and is expected to observe it at its
    /// suspension points and return once it fires.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(ShutdownRx) -> Fut,
        Fut: Future<Output = ConveyorResult<()>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let handle = tokio::spawn(run(shutdown_rx));

        Self {
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Spawns a ticker-driven loop that runs `tick` once per `period`.
    ///
    /// The first tick fires immediately. Each pass waits on the ticker and the
    /// shutdown signal simultaneously, so the loop exits promptly even
    /// mid-interval. A tick returning an error ends the loop; the error is
    /// surfaced by [`stop`](ShutdownCoordinator::stop).
    pub fn spawn_periodic<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ConveyorResult<()>> + Send,
    {
        Self::spawn(move |shutdown_rx| async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.wait_for_shutdown() => {
                        debug!("periodic loop observed shutdown, exiting");
                        return Ok(());
                    }
                    _ = ticker.tick() => {
                        tick().await?;
                    }
                }
            }
        })
    }

    /// Returns a new receiver for this coordinator's shutdown signal.
    ///
    /// Useful for wiring the same stop signal into queues and pools the
    /// managed loop feeds.
    pub fn shutdown_rx(&self) -> ShutdownRx {
        self.shutdown_tx.subscribe()
    }

    /// Returns a transmitter for this coordinator's shutdown signal.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Fires the shutdown signal and waits for the managed loop to exit.
    ///
    /// Never returns before the loop has fully exited. Returns the loop's own
    /// result, or [`ErrorKind::TaskPanic`] if the loop panicked. A second call
    /// is a no-op returning `Ok(())`.
    pub async fn stop(&self) -> ConveyorResult<()> {
        self.shutdown_tx.shutdown();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            debug!("coordinator already stopped");
            return Ok(());
        };

        match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(conveyor_error!(
                ErrorKind::TaskPanic,
                "managed loop panicked",
                detail = join_err.to_string()
            )),
        }
    }
}
