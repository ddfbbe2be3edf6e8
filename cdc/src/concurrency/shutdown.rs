//! Shutdown signaling for long-running connector tasks.
//!
//! Wraps a watch channel into a pair of shutdown handles. The channel carries no
//! payload; it only notifies subscribed tasks that they should stop. Every receiver
//! observes the same request, and receivers can be created at any time via
//! [`ShutdownTx::subscribe`].

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
///
/// Held by the owner of the task lifecycle; calling `send(())` requests shutdown
/// from every subscribed task.
pub type ShutdownTx = watch::Sender<()>;

/// Receiver side of the shutdown channel.
///
/// Tasks await `changed()` to observe the shutdown request without polling.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (tx, rx)
}
