//! Outbound calls into the broker

use mosqbridge_core::{EventKind, PluginIdentifier, StatusCode};

/// Registration calls the bridge makes into the broker
///
/// The production implementation is [`MosquittoHost`](crate::MosquittoHost);
/// tests substitute recording or failing brokers.
pub trait BrokerApi: Send + Sync {
    /// Ask the broker to deliver `kind` events to this plugin instance
    fn register_event(&self, identifier: PluginIdentifier, kind: EventKind) -> StatusCode;

    /// Stop delivery of `kind` events to this plugin instance
    fn unregister_event(&self, identifier: PluginIdentifier, kind: EventKind) -> StatusCode;
}
