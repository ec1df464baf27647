//! Bounded background dispatcher
//!
//! Broker threads only enqueue. A single worker task on the plugin's own
//! Tokio runtime hands bodies to the [`Publisher`] in arrival order.

use crate::config::FailMode;
use mosqbridge::prelude::*;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Destination for forwarded message bodies
///
/// Called from a blocking-pool thread, one body at a time.
pub trait Publisher: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn publish(&self, body: &[u8]) -> BridgeResult<()>;
}

/// Publisher that writes each body to the broker log
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    fn publish(&self, body: &[u8]) -> BridgeResult<()> {
        tracing::info!(body = %String::from_utf8_lossy(body), "queue-forward: message");
        Ok(())
    }
}

/// Why a body was not enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("queue-forward: dispatcher stopped")]
    Stopped,

    #[error("queue-forward: queue full")]
    QueueFull,

    #[error("queue-forward: enqueue timeout")]
    Timeout,
}

pub struct Dispatcher {
    runtime: AsyncRuntime,
    sender: RwLock<Option<mpsc::Sender<Vec<u8>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the worker with room for `buffer` queued bodies
    pub fn start(buffer: usize, publisher: Arc<dyn Publisher>) -> BridgeResult<Self> {
        let runtime = AsyncRuntime::new(
            RuntimeConfig::new()
                .with_worker_threads(1)
                .with_thread_name("queue-forward"),
        )?;
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let worker = runtime.spawn(run_worker(receiver, publisher));

        Ok(Self {
            runtime,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue one body
    ///
    /// With [`FailMode::Block`] a full queue is waited on for at most
    /// `wait`; every other mode fails immediately.
    pub fn enqueue(&self, body: Vec<u8>, mode: FailMode, wait: Duration) -> Result<(), EnqueueError> {
        let Some(sender) = self.sender.read().clone() else {
            return Err(EnqueueError::Stopped);
        };

        match sender.try_send(body) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(EnqueueError::Stopped),
            Err(TrySendError::Full(body)) if mode == FailMode::Block => {
                self.enqueue_blocking(&sender, body, wait)
            }
            Err(TrySendError::Full(_)) => Err(EnqueueError::QueueFull),
        }
    }

    fn enqueue_blocking(
        &self,
        sender: &mpsc::Sender<Vec<u8>>,
        body: Vec<u8>,
        wait: Duration,
    ) -> Result<(), EnqueueError> {
        if !self.runtime.is_running() {
            return Err(EnqueueError::Stopped);
        }
        // A concurrent stop ends the wait early; the runtime's timers must not
        // be polled once it starts shutting down
        let mut shutdown = self.runtime.shutdown_signal();
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = shutdown.wait() => Err(EnqueueError::Stopped),
                sent = tokio::time::timeout(wait, sender.send(body)) => match sent {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(EnqueueError::Stopped),
                    Err(_) => Err(EnqueueError::Timeout),
                },
            }
        })
    }

    /// Bodies queued and not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map_or(0, |s| s.max_capacity() - s.capacity())
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Stop accepting bodies and let the worker drain what is queued
    ///
    /// Waits at most `timeout`; returns false if the worker had not finished,
    /// in which case the remaining bodies are abandoned.
    pub fn stop(&self, timeout: Duration) -> bool {
        let pending = self.pending();
        // Dropping the last sender ends the worker once the queue is empty
        drop(self.sender.write().take());

        let Some(worker) = self.worker.lock().take() else {
            return true;
        };
        let drained = self.runtime.is_running()
            && self
                .runtime
                .block_on(async { tokio::time::timeout(timeout, worker).await.is_ok() });
        if !drained {
            tracing::warn!(
                wait_ms = timeout.as_millis() as u64,
                pending,
                "queue-forward: dispatcher stop timeout"
            );
        }

        self.runtime.shutdown(timeout);
        drained
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

async fn run_worker(mut receiver: mpsc::Receiver<Vec<u8>>, publisher: Arc<dyn Publisher>) {
    let failures = Sampler::new(128);

    while let Some(body) = receiver.recv().await {
        let publisher = publisher.clone();
        let result = tokio::task::spawn_blocking(move || publisher.publish(&body)).await;
        let error = match result {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(join) => join.to_string(),
        };
        if failures.should_sample() {
            tracing::warn!(error = %error, "queue-forward: worker publish failed");
        }
    }

    tracing::debug!("queue-forward: dispatcher worker stopped");
}
