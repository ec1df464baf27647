//! mosqbridge-runtime - Tokio runtime for plugins that offload work
//!
//! Broker callbacks run on broker threads and must return quickly. Plugins
//! that hand work to background tasks use this crate:
//! - [`AsyncRuntime`] owns a multi-threaded Tokio runtime with a bounded shutdown
//! - [`ShutdownHandle`] / [`ShutdownSignal`] broadcast the stop request to tasks

mod runtime;
mod shutdown;

pub use runtime::{AsyncRuntime, RuntimeConfig};
pub use shutdown::{ShutdownHandle, ShutdownSignal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AsyncRuntime, RuntimeConfig, ShutdownHandle, ShutdownSignal};
}
