//! Forwarded message envelope and message filters

use mosqbridge::prelude::*;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// JSON body handed to the publisher for every forwarded message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub ts_ms: u64,
    pub topic: String,
    pub payload: Value,
    pub qos: u8,
    pub retain: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// MQTT v5 user properties, as `{"k": .., "v": ..}` pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_properties: Vec<UserProperty>,
}

impl QueueMessage {
    pub fn new(
        topic: &str,
        payload: Value,
        qos: u8,
        retain: bool,
        client: Option<&ClientInfo<'_>>,
    ) -> Self {
        let client = client.copied().unwrap_or_default();
        Self {
            ts_ms: now_ms(),
            topic: topic.to_string(),
            payload,
            qos,
            retain,
            client_id: client.client_id.to_string(),
            username: client.username.to_string(),
            peer: client.peer.to_string(),
            protocol: client.protocol().to_string(),
            user_properties: Vec::new(),
        }
    }

    pub fn with_user_properties(mut self, properties: &[UserProperty]) -> Self {
        self.user_properties = properties.to_vec();
        self
    }

    pub fn to_bytes(&self) -> BridgeResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Why a message payload cannot be forwarded
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is empty, valid JSON required")]
    Empty,

    #[error("payload is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse a message payload as JSON, ignoring surrounding whitespace
pub fn parse_payload(payload: &[u8]) -> Result<Value, PayloadError> {
    let trimmed = payload.trim_ascii();
    if trimmed.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(serde_json::from_slice(trimmed)?)
}

/// Broker system topics are never forwarded
///
/// Returns the filter reason for topics that are skipped.
pub fn filter_topic(topic: &str) -> Option<&'static str> {
    if topic == "$SYS" || topic.starts_with("$SYS/") {
        Some("sys_topic")
    } else {
        None
    }
}
