//! # Shutdown Signal
//!
//! Cooperative cancellation shared by the polling loop and every suspension
//! point inside it. Once triggered the signal stays triggered, so a task
//! that starts waiting after the trigger returns immediately.

use std::sync::Arc;

use tokio::sync::watch;

/// Sending half; dropping it also counts as shutdown
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

/// Receiving half, cheap to clone into each task
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
    /// Sender owned by a `never()` signal so the channel stays open
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

/// Create a connected trigger/signal pair
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownTrigger { sender },
        ShutdownSignal {
            receiver,
            _keepalive: None,
        },
    )
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace never fails, even with no receivers left
        self.sender.send_replace(true);
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            _keepalive: None,
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            receiver,
            _keepalive: Some(Arc::new(sender)),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&mut self) {
        // An error means the trigger was dropped, which is also a shutdown
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }

    /// Owned future for use in `tokio::select!` without borrowing `self`
    pub async fn cancelled(&self) {
        let mut signal = self.clone();
        signal.wait().await;
    }
}
