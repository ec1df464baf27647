//! Tokio runtime management

use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use mosqbridge_core::{BridgeError, BridgeResult};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

/// Configuration for the async runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    pub worker_threads: Option<usize>,
    /// Name prefix for worker threads
    pub thread_name: String,
    /// Enable I/O driver
    pub enable_io: bool,
    /// Enable time driver
    pub enable_time: bool,
    /// Maximum blocking threads
    pub max_blocking_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "mosqbridge-worker".to_string(),
            enable_io: true,
            enable_time: true,
            max_blocking_threads: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Tokio runtime owned by one plugin instance
///
/// Work is submitted through a cloned [`Handle`], so submitting never takes
/// the lock that guards the runtime itself. [`AsyncRuntime::shutdown`] takes
/// the runtime out and bounds how long teardown may block the broker.
pub struct AsyncRuntime {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    shutdown_handle: ShutdownHandle,
    config: RuntimeConfig,
}

impl AsyncRuntime {
    pub fn new(config: RuntimeConfig) -> BridgeResult<Self> {
        let mut builder = Builder::new_multi_thread();

        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }

        builder
            .thread_name(&config.thread_name)
            .max_blocking_threads(config.max_blocking_threads);

        if config.enable_io {
            builder.enable_io();
        }

        if config.enable_time {
            builder.enable_time();
        }

        let runtime = builder
            .build()
            .map_err(|e| BridgeError::InitFailure(format!("failed to create runtime: {e}")))?;
        let handle = runtime.handle().clone();

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            shutdown_handle: ShutdownHandle::new(),
            config,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Signal that fires when [`shutdown`](Self::shutdown) starts
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_handle.signal()
    }

    /// Block on a future from a broker (non-runtime) thread
    ///
    /// Must not be called from inside the runtime.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: std::future::Future,
    {
        self.handle.block_on(future)
    }

    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Signal tasks to stop and tear the runtime down
    ///
    /// Blocks for at most `timeout` waiting on blocking tasks; anything still
    /// running after that is abandoned. Calling it again is a no-op.
    pub fn shutdown(&self, timeout: Duration) {
        self.shutdown_handle.trigger();

        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };

        tracing::debug!(?timeout, "shutting down runtime");
        runtime.shutdown_timeout(timeout);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_handle.is_triggered()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }
}

impl Drop for AsyncRuntime {
    fn drop(&mut self) {
        self.shutdown_handle.trigger();
        // Never block in drop; it may run on a broker thread or inside the runtime
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
