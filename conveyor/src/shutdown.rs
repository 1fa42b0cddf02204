//! Cooperative shutdown plumbing shared by every toolkit component.
//!
//! Shutdown is modeled as a broadcast: a single [`ShutdownTx`] notifies any number
//! of [`ShutdownRx`] subscribers simultaneously. Receivers never consume the signal,
//! so late subscribers and repeated checks all observe the same terminal state.
//! Queue operations, semaphore acquisition, and managed loops all accept a
//! [`ShutdownRx`] at their suspension points and resolve with a cancellation
//! outcome instead of blocking forever.

use tokio::sync::watch;

/// Transmitter side of the shutdown broadcast.
///
/// Cloning is cheap; every clone controls the same underlying channel. Dropping the
/// last transmitter is treated as a shutdown so receivers can never wait on a
/// channel nobody can fire.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Fires the shutdown signal.
    ///
    /// Idempotent: firing an already-fired channel has no further effect.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// Creates a new receiver subscribed to this transmitter.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown broadcast.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Resolves immediately when the signal already fired. A dropped [`ShutdownTx`]
    /// counts as shutdown.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.0.clone();
        // An Err here means the sender is gone, which we treat as shutdown.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Creates a new shutdown broadcast channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

/// Outcome of a drain-style operation that races against shutdown.
///
/// `Ok` carries the value of a run that completed on its own terms; `Shutdown`
/// carries whatever was collected up to the moment the signal fired, so callers
/// never lose in-flight items on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, S> {
    /// The operation ran to completion.
    Ok(T),
    /// The operation was interrupted by shutdown; carries the partial state.
    Shutdown(S),
}

impl<T, S> ShutdownResult<T, S> {
    /// Returns whether this outcome was caused by shutdown.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}
