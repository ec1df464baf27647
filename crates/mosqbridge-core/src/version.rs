//! Plugin API version negotiation

use crate::{BridgeError, BridgeResult};

/// Plugin API versions implemented by the bridge's ABI layer
pub const PLUGIN_API_VERSIONS: &[i32] = &[5];

/// Value returned from the version entry point to make the broker refuse
/// loading the plugin before any init call
pub const VERSION_ABORT: i32 = -1;

/// Select the highest version supported by both sides
///
/// Order of either input is irrelevant and duplicates are tolerated.
///
/// # Example
///
/// ```
/// use mosqbridge_core::negotiate;
///
/// assert_eq!(negotiate(&[3, 4, 5], &[4, 5, 6]).unwrap(), 5);
/// assert!(negotiate(&[1, 2], &[3]).is_err());
/// ```
pub fn negotiate(broker_supported: &[i32], plugin_supported: &[i32]) -> BridgeResult<i32> {
    broker_supported
        .iter()
        .filter(|v| plugin_supported.contains(v))
        .max()
        .copied()
        .ok_or_else(|| BridgeError::VersionUnsupported {
            broker: broker_supported.to_vec(),
            plugin: plugin_supported.to_vec(),
        })
}

/// Negotiate and map the result onto the value the broker expects
///
/// Incompatibility becomes [`VERSION_ABORT`] rather than a generic error code.
pub fn version_reply(broker_supported: &[i32], plugin_supported: &[i32]) -> i32 {
    negotiate(broker_supported, plugin_supported).unwrap_or(VERSION_ABORT)
}

#[cfg(test)]
#[path = "version/version_tests.rs"]
mod version_tests;
