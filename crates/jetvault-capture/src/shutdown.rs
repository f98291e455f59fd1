//! Graceful shutdown plumbing.
//!
//! The capture loop takes a [`Shutdown`] receiver and drains when it
//! fires: one final force-flush sweep commits every open block before
//! `run` returns. [`ShutdownHandle`] is the triggering side; callers can
//! wire it to their own signal handling or use
//! [`ShutdownHandle::install_ctrl_c`].

use tokio::sync::watch;
use tracing::info;

/// Handle for triggering shutdown of a capture run.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }

    /// Obtain a receiver to hand to [`crate::Capture::run`].
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }

    /// Spawn a task that triggers shutdown on SIGINT (Ctrl+C).
    pub fn install_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
                handle.shutdown();
            }
        });
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a shutdown signal.
#[derive(Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until shutdown is requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.receiver.borrow() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                // All handles dropped; treat as a shutdown request.
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let handle = ShutdownHandle::new();
        let mut shutdown = handle.subscribe();
        assert!(!shutdown.is_triggered());

        handle.shutdown();
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let handle = ShutdownHandle::new();
        let shutdown = handle.subscribe();
        handle.shutdown();
        handle.shutdown();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_handle_unblocks_waiters() {
        let handle = ShutdownHandle::new();
        let mut shutdown = handle.subscribe();
        drop(handle);
        // Should return rather than hang.
        shutdown.triggered().await;
    }

    #[tokio::test]
    async fn test_subscribe_after_trigger() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        let shutdown = handle.subscribe();
        assert!(shutdown.is_triggered());
    }
}
