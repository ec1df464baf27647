//! # mosqbridge
//!
//! A framework for writing Mosquitto broker plugins in Rust.
//!
//! mosqbridge speaks the broker's plugin ABI (version 5) under the hood and
//! gives plugin authors:
//! - Plugin API version negotiation
//! - A guarded init / cleanup lifecycle with rollback on partial failure
//! - Event callback registration and panic-safe dispatch
//! - `tracing` forwarded into the broker log
//! - An optional Tokio runtime for background work
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! mosqbridge = "0.3"
//! ```
//!
//! ## Creating a Plugin
//!
//! ```ignore
//! use mosqbridge::prelude::*;
//!
//! #[derive(Default)]
//! pub struct DenyAnonymous;
//!
//! impl EventHandler for DenyAnonymous {
//!     fn name(&self) -> &'static str {
//!         "deny-anonymous"
//!     }
//!
//!     fn events(&self) -> &[EventKind] {
//!         &[EventKind::BasicAuth]
//!     }
//!
//!     fn handle_event(
//!         &self,
//!         _ctx: &PluginContext,
//!         event: &EventPayload<'_>,
//!     ) -> BridgeResult<EventReply> {
//!         match event {
//!             EventPayload::BasicAuth { username: "", .. } => {
//!                 Ok(EventReply::reject(StatusCode::Auth))
//!             }
//!             _ => Ok(EventReply::defer()),
//!         }
//!     }
//! }
//!
//! // Generate the mosquitto_plugin_* symbols
//! mosqbridge::mosquitto_plugin!(DenyAnonymous::default);
//! ```
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports from:
//! - [`mosqbridge_core`] - Version negotiation, lifecycle, events, options
//! - [`mosqbridge_ffi`] - ABI entry points, registry, host functions
//! - [`mosqbridge_logging`] - Broker log forwarding
//! - [`mosqbridge_runtime`] - Tokio runtime for background work

// Re-export core types
pub use mosqbridge_core::{
    BridgeError, BridgeResult, ClientInfo, DispatchOutcome, EventHandler, EventKind, EventPayload,
    EventReply, LifecycleState, LogLevel, MessageMutation, OptionEntry, OptionKind, OptionSpec,
    PluginContext, PluginIdentifier, PluginOptions, StatusCode, UserProperty, negotiate,
};

// Re-export FFI types and the entry point macro
pub use mosqbridge_ffi::{
    BrokerApi, EventRegistry, InstanceManager, MosquittoHost, PluginInstance, mosquitto_plugin,
};

pub use mosqbridge_logging::{LogForwarder, Sampler};
pub use mosqbridge_runtime::{AsyncRuntime, RuntimeConfig, ShutdownHandle, ShutdownSignal};

// Re-export common dependencies that plugin authors need
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// Prelude module for convenient imports.
///
/// Use `use mosqbridge::prelude::*;` to import commonly used types.
pub mod prelude {
    pub use crate::{
        AsyncRuntime, BridgeError, BridgeResult, ClientInfo, EventHandler, EventKind,
        EventPayload, EventReply, LogLevel, MessageMutation, OptionKind, OptionSpec,
        PluginContext, PluginOptions, RuntimeConfig, Sampler, StatusCode, UserProperty,
    };

    // Serde derives (commonly needed for forwarded message types)
    pub use serde::{Deserialize, Serialize};
}
