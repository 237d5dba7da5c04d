//! Shutdown signaling between the orchestrator handle and its background task.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
pub type ShutdownTx = watch::Sender<()>;

/// Receiver side of the shutdown channel.
///
/// The background task checks [`watch::Receiver::changed`] between passes. A pass that already
/// started always runs to completion.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(())
}
