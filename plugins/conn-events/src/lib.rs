//! conn-events - Mosquitto plugin tracking client connections
//!
//! Records one event per client connect and one per disconnect. The broker
//! can report a disconnect more than once for the same connection, so the
//! tracker takes the connection atomically and later duplicates are skipped.

use dashmap::DashMap;
use mosqbridge::prelude::*;
use once_cell::sync::OnceCell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Option key for the debug log sampling period
pub const SAMPLE_EVERY_KEY: &str = "conn_sample_every";
/// Default debug log sampling period
pub const DEFAULT_SAMPLE_EVERY: u64 = 128;

const OPTIONS: &[OptionSpec] =
    &[OptionSpec::new(SAMPLE_EVERY_KEY, OptionKind::Integer).with_default("128")];

// ============================================================================
// Event Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEventKind {
    Connect,
    Disconnect,
}

/// One recorded connection event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub event: ConnectionEventKind,
    pub ts_ms: u64,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<i32>,
}

impl ConnectionEvent {
    pub fn new(event: ConnectionEventKind, client: &ClientInfo<'_>, reason: Option<i32>) -> Self {
        Self {
            event,
            ts_ms: now_ms(),
            client_id: client.client_id.to_string(),
            username: client.username.to_string(),
            peer: client.peer.to_string(),
            protocol: client.protocol().to_string(),
            reason,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Connection Tracking
// ============================================================================

/// Connections seen connecting and not yet disconnected
///
/// Keyed by the broker's connection identity, which stays stable for the
/// life of a connection.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: DashMap<usize, ConnectionEvent>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection active, returning the record it replaced
    pub fn connect(&self, key: usize, event: ConnectionEvent) -> Option<ConnectionEvent> {
        self.active.insert(key, event)
    }

    /// Remove and return the connection's record
    ///
    /// Only one caller can take a given connection; concurrent or repeated
    /// takes get `None`.
    pub fn take(&self, key: usize) -> Option<ConnectionEvent> {
        self.active.remove(&key).map(|(_, v)| v)
    }

    pub fn is_connected(&self, key: usize) -> bool {
        self.active.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&self) {
        self.active.clear();
    }
}

// ============================================================================
// Plugin Implementation
// ============================================================================

/// Connection event plugin
#[derive(Debug, Default)]
pub struct ConnEvents {
    tracker: ConnectionTracker,
    skip_sampler: OnceCell<Sampler>,
    record_sampler: OnceCell<Sampler>,
}

impl ConnEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    fn sampled(cell: &OnceCell<Sampler>) -> bool {
        cell.get_or_init(|| Sampler::new(DEFAULT_SAMPLE_EVERY))
            .should_sample()
    }

    fn record(&self, event: &ConnectionEvent) {
        match serde_json::to_string(event) {
            Ok(line) => tracing::info!(record = %line, "conn-events: connection event"),
            Err(e) => tracing::warn!(error = %e, "conn-events: record event failed"),
        }
        if Self::sampled(&self.record_sampler) {
            tracing::debug!(
                event = ?event.event,
                client_id = %event.client_id,
                active = self.tracker.len(),
                "conn-events: recorded"
            );
        }
    }

    fn on_connect(&self, client: &ClientInfo<'_>) {
        let event = ConnectionEvent::new(ConnectionEventKind::Connect, client, None);
        if self.tracker.connect(client.connection, event.clone()).is_some() {
            tracing::debug!(
                client_id = client.client_id,
                "conn-events: connect for already active connection"
            );
        }
        self.record(&event);
    }

    fn on_disconnect(&self, client: &ClientInfo<'_>, reason: i32) {
        if self.tracker.take(client.connection).is_none() {
            if Self::sampled(&self.skip_sampler) {
                tracing::debug!(
                    connection = client.connection,
                    "conn-events: skip disconnect record"
                );
            }
            return;
        }
        let event = ConnectionEvent::new(ConnectionEventKind::Disconnect, client, Some(reason));
        self.record(&event);
    }
}

impl EventHandler for ConnEvents {
    fn name(&self) -> &'static str {
        "conn-events"
    }

    fn events(&self) -> &[EventKind] {
        &[EventKind::Connect, EventKind::Disconnect]
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    fn on_init(&self, ctx: &PluginContext) -> BridgeResult<()> {
        let every = ctx
            .options()
            .get::<u64>(SAMPLE_EVERY_KEY)
            .unwrap_or(DEFAULT_SAMPLE_EVERY);
        // Set once per instance; a second init never reaches the handler
        let _ = self.skip_sampler.set(Sampler::new(every));
        let _ = self.record_sampler.set(Sampler::new(every));
        self.tracker.clear();

        tracing::info!(sample_every = every, "conn-events: initializing");
        Ok(())
    }

    fn handle_event(&self, _ctx: &PluginContext, event: &EventPayload<'_>) -> BridgeResult<EventReply> {
        match event {
            EventPayload::Connect { client } => self.on_connect(client),
            EventPayload::Disconnect { client, reason } => self.on_disconnect(client, *reason),
            // Connect/disconnect without a client: nothing to record
            EventPayload::Opaque(EventKind::Connect | EventKind::Disconnect) => {}
            other => return Err(BridgeError::NotHandled(other.kind())),
        }
        Ok(EventReply::accept())
    }

    fn on_cleanup(&self, _ctx: &PluginContext) -> BridgeResult<()> {
        tracing::info!(
            still_connected = self.tracker.len(),
            "conn-events: plugin cleaned up"
        );
        self.tracker.clear();
        Ok(())
    }
}

mosqbridge::mosquitto_plugin!(ConnEvents::new);

#[cfg(test)]
mod lib_tests;
