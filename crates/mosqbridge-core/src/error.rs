//! Error types for the bridge

use crate::{EventKind, StatusCode};
use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No plugin API version is supported by both broker and plugin
    #[error("no common plugin API version: broker supports {broker:?}, plugin supports {plugin:?}")]
    VersionUnsupported { broker: Vec<i32>, plugin: Vec<i32> },

    /// Lifecycle method called outside its valid source state
    #[error("invalid lifecycle state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Plugin instance could not be initialized
    #[error("initialization failed: {0}")]
    InitFailure(String),

    /// An init option was missing, refused, or unknown under a strict policy
    #[error("configuration error for '{key}': {reason}")]
    Config { key: String, reason: String },

    /// The broker rejected an event (un)registration
    #[error("broker rejected registration of {kind}: {status}")]
    Registration { kind: EventKind, status: StatusCode },

    /// No handler is registered for the event kind
    #[error("no handler registered for {0}")]
    NotHandled(EventKind),

    /// Handler logic failed for a single event
    #[error("handler error: {0}")]
    Handler(String),

    /// A broker-provided function could not be resolved or returned garbage
    #[error("host error: {0}")]
    Host(String),

    /// A panic was caught at the bridge boundary
    #[error("panic caught: {0}")]
    Panic(String),
}

impl BridgeError {
    /// Status code reported to the broker for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::VersionUnsupported { .. } => StatusCode::NotSupported,
            BridgeError::InvalidState { .. } => StatusCode::Unknown,
            BridgeError::InitFailure(_) => StatusCode::Unknown,
            BridgeError::Config { .. } => StatusCode::Inval,
            BridgeError::Registration { status, .. } => {
                if status.is_success() {
                    StatusCode::Unknown
                } else {
                    *status
                }
            }
            BridgeError::NotHandled(kind) => kind.pass_through_status(),
            BridgeError::Handler(_) => StatusCode::Unknown,
            BridgeError::Host(_) => StatusCode::Unknown,
            BridgeError::Panic(_) => StatusCode::Unknown,
        }
    }

    /// Whether this error ends the plugin instance
    ///
    /// Everything else is scoped to the call that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::VersionUnsupported { .. }
                | BridgeError::InitFailure(_)
                | BridgeError::Config { .. }
        )
    }

    /// Shorthand for a configuration error
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Handler(format!("serialization error: {}", err))
    }
}


#[cfg(test)]
#[path = "error/error_parameterized_tests.rs"]
mod error_parameterized_tests;
