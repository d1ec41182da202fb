//! Cooperative shutdown signal.
//!
//! A single `watch::Sender<bool>` is owned by the process entry point; the hub
//! dispatch loop and the broker bridge each hold a receiver. Flipping the
//! value to `true` (or dropping the sender) stops both loops.

use tokio::sync::watch;

/// Create a fresh shutdown channel in the "running" state.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested or the sender is gone.
pub async fn signalled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Non-blocking check used between loop iterations.
pub fn is_signalled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
