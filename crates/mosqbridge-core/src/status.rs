//! Broker status codes

use serde::{Deserialize, Serialize};

/// Outcome code returned to the broker from every entry point
///
/// Values match the broker's `MOSQ_ERR_*` constants. Only the subset the
/// bridge produces or needs to recognize is modelled; any other raw value
/// received from the broker maps to [`StatusCode::Unknown`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Call succeeded / event accepted
    Success = 0,
    /// Out of memory
    NoMem = 1,
    /// Invalid input (bad configuration, bad arguments)
    Inval = 3,
    /// Client connection should be dropped
    ConnLost = 7,
    /// Requested feature or version is not supported
    NotSupported = 10,
    /// Authentication denied
    Auth = 11,
    /// Access denied; for message events the message is rejected
    AclDenied = 12,
    /// Generic failure
    Unknown = 13,
    /// Not handled by this plugin; the broker moves on to the next one
    PluginDefer = 17,
}

impl StatusCode {
    /// Raw value handed back across the ABI
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Interpret a raw value returned by the broker
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => StatusCode::Success,
            1 => StatusCode::NoMem,
            3 => StatusCode::Inval,
            7 => StatusCode::ConnLost,
            10 => StatusCode::NotSupported,
            11 => StatusCode::Auth,
            12 => StatusCode::AclDenied,
            17 => StatusCode::PluginDefer,
            _ => StatusCode::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCode::Success => "MOSQ_ERR_SUCCESS",
            StatusCode::NoMem => "MOSQ_ERR_NOMEM",
            StatusCode::Inval => "MOSQ_ERR_INVAL",
            StatusCode::ConnLost => "MOSQ_ERR_CONN_LOST",
            StatusCode::NotSupported => "MOSQ_ERR_NOT_SUPPORTED",
            StatusCode::Auth => "MOSQ_ERR_AUTH",
            StatusCode::AclDenied => "MOSQ_ERR_ACL_DENIED",
            StatusCode::Unknown => "MOSQ_ERR_UNKNOWN",
            StatusCode::PluginDefer => "MOSQ_ERR_PLUGIN_DEFER",
        };
        write!(f, "{}({})", name, self.as_raw())
    }
}
