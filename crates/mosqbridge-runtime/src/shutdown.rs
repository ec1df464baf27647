//! Shutdown signalling between the plugin and its background tasks

use std::sync::Arc;
use tokio::sync::watch;

/// Handle for triggering shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown; returns `true` only for the first call
    pub fn trigger(&self) -> bool {
        !self.sender.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Get a signal that observes this handle
    ///
    /// Signals created after the trigger see it immediately.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal for detecting shutdown (cloneable, can be passed to tasks)
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Check if shutdown has been triggered (non-blocking)
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for shutdown to be triggered
    ///
    /// Returns immediately if already triggered, or if every handle was
    /// dropped without triggering (nobody is left to stop the task).
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }

    /// Future that completes on shutdown, for use in `select!`
    pub fn notified(&mut self) -> impl std::future::Future<Output = ()> + '_ {
        self.wait()
    }
}
