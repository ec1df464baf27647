//! mosqbridge-core - Core types, version negotiation, and lifecycle state
//!
//! This crate provides the broker-agnostic building blocks of the bridge:
//! - [`negotiate`] for plugin API version selection
//! - [`LifecycleState`] for the plugin instance state machine
//! - [`EventHandler`] capability trait implemented by plugin logic
//! - [`EventPayload`] / [`EventReply`] for decoded events and handler replies
//! - [`OptionTable`] / [`PluginOptions`] for init-time configuration
//! - [`PluginContext`] and [`DispatchGate`] for per-instance shared state
//! - [`BridgeError`] and [`StatusCode`] for error handling

mod config;
mod context;
mod error;
mod event;
mod gate;
mod handler;
mod lifecycle;
mod status;
mod version;

pub use config::{
    Disposition, OptionEntry, OptionKind, OptionSpec, OptionTable, PluginOptions,
    UnknownKeyPolicy, parse_bool, parse_millis,
};
pub use context::{DispatchStats, PluginContext, PluginIdentifier};
pub use error::{BridgeError, BridgeResult};
pub use event::{
    ClientInfo, DispatchOutcome, EventKind, EventPayload, EventReply, MessageMutation,
    OutcomeKind, UserProperty,
};
pub use gate::{DispatchGate, InFlightGuard};
pub use handler::EventHandler;
pub use lifecycle::LifecycleState;
pub use status::StatusCode;
pub use version::{PLUGIN_API_VERSIONS, VERSION_ABORT, negotiate, version_reply};

/// Log levels for forwarded log records
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

/// Broker log level bit for debug records (`MOSQ_LOG_DEBUG`)
pub const MOSQ_LOG_DEBUG: i32 = 0x10;
/// Broker log level bit for informational records (`MOSQ_LOG_INFO`)
pub const MOSQ_LOG_INFO: i32 = 0x01;
/// Broker log level bit for warnings (`MOSQ_LOG_WARNING`)
pub const MOSQ_LOG_WARNING: i32 = 0x04;
/// Broker log level bit for errors (`MOSQ_LOG_ERR`)
pub const MOSQ_LOG_ERR: i32 = 0x08;

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }

    /// Parse a level name as used in plugin options (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" | "err" => Some(LogLevel::Error),
            "off" | "none" => Some(LogLevel::Off),
            _ => None,
        }
    }

    /// Broker log level bit for this level
    ///
    /// The broker has no trace level, so trace records go out as debug.
    /// Returns `None` for [`LogLevel::Off`].
    pub fn broker_level(&self) -> Option<i32> {
        match self {
            LogLevel::Trace | LogLevel::Debug => Some(MOSQ_LOG_DEBUG),
            LogLevel::Info => Some(MOSQ_LOG_INFO),
            LogLevel::Warn => Some(MOSQ_LOG_WARNING),
            LogLevel::Error => Some(MOSQ_LOG_ERR),
            LogLevel::Off => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeError, BridgeResult, ClientInfo, EventHandler, EventKind, EventPayload, EventReply,
        LifecycleState, LogLevel, MessageMutation, OptionKind, OptionSpec, PluginContext,
        PluginOptions, StatusCode, UserProperty,
    };
}
