//! mosqbridge-logging - Forwarding of plugin logs to the broker
//!
//! This crate provides:
//! - [`LogSink`] trait for whatever finally writes a record (the broker's
//!   `mosquitto_log_printf` in production)
//! - [`LogForwarder`] process-wide, level-filtered forwarding to the sink
//! - [`BrokerLogLayer`] tracing layer that feeds `tracing` events into the forwarder
//! - [`Sampler`] for throttling debug logs on hot event paths

mod forwarder;
mod layer;
mod sampler;

pub use forwarder::{LogForwarder, LogSink};
pub use layer::{BrokerLogLayer, init_logging};
pub use mosqbridge_core::LogLevel;
pub use sampler::Sampler;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{BrokerLogLayer, LogForwarder, LogLevel, LogSink, Sampler, init_logging};
}
