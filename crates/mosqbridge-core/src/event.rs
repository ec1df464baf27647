//! Broker events, decoded payloads, and handler replies

use crate::StatusCode;
use serde::{Deserialize, Serialize};

/// Broker event classes a plugin can subscribe to
///
/// Discriminants are the broker's `MOSQ_EVT_*` values.
#[repr(i32)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Reload = 0,
    AclCheck = 1,
    BasicAuth = 2,
    ExtAuthStart = 3,
    ExtAuthContinue = 4,
    Control = 5,
    Message = 6,
    PskKey = 7,
    Tick = 8,
    Disconnect = 9,
    Connect = 10,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Reload,
        EventKind::AclCheck,
        EventKind::BasicAuth,
        EventKind::ExtAuthStart,
        EventKind::ExtAuthContinue,
        EventKind::Control,
        EventKind::Message,
        EventKind::PskKey,
        EventKind::Tick,
        EventKind::Disconnect,
        EventKind::Connect,
    ];

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_raw() == value)
    }

    /// Whether the broker runs this kind as a decision chain where
    /// `PluginDefer` passes the decision to the next plugin
    ///
    /// For every other kind the broker treats any non-success status as a
    /// failure of the event itself.
    pub fn is_deferrable(self) -> bool {
        matches!(
            self,
            EventKind::AclCheck
                | EventKind::BasicAuth
                | EventKind::ExtAuthStart
                | EventKind::ExtAuthContinue
                | EventKind::PskKey
        )
    }

    /// Status meaning "this plugin has no opinion" for this kind
    pub fn pass_through_status(self) -> StatusCode {
        if self.is_deferrable() {
            StatusCode::PluginDefer
        } else {
            StatusCode::Success
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Reload => "reload",
            EventKind::AclCheck => "acl_check",
            EventKind::BasicAuth => "basic_auth",
            EventKind::ExtAuthStart => "ext_auth_start",
            EventKind::ExtAuthContinue => "ext_auth_continue",
            EventKind::Control => "control",
            EventKind::Message => "message",
            EventKind::PskKey => "psk_key",
            EventKind::Tick => "tick",
            EventKind::Disconnect => "disconnect",
            EventKind::Connect => "connect",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Client details read from the broker for the duration of one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientInfo<'a> {
    /// Identity of the broker's client object; stable while the connection lives
    pub connection: usize,
    pub client_id: &'a str,
    pub username: &'a str,
    pub peer: &'a str,
    /// MQTT protocol version number (3, 4, or 5); 0 when unknown
    pub protocol_version: i32,
}

impl ClientInfo<'_> {
    /// Protocol name as logged and forwarded
    pub fn protocol(&self) -> &'static str {
        match self.protocol_version {
            3 => "mqttv31",
            4 => "mqttv311",
            5 => "mqttv5",
            _ => "",
        }
    }
}

/// MQTT v5 user property (`k`/`v` when serialized)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserProperty {
    #[serde(rename = "k")]
    pub key: String,
    #[serde(rename = "v")]
    pub value: String,
}

impl UserProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Event data borrowed from the broker
///
/// Everything here is only valid until the handler returns; the lifetime
/// keeps handlers from holding on to it. Copy what must outlive the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload<'a> {
    Connect {
        client: ClientInfo<'a>,
    },
    Disconnect {
        client: ClientInfo<'a>,
        reason: i32,
    },
    Message {
        client: Option<ClientInfo<'a>>,
        topic: &'a str,
        payload: &'a [u8],
        qos: u8,
        retain: bool,
        /// MQTT v5 user properties in wire order; empty for older clients
        user_properties: &'a [UserProperty],
    },
    BasicAuth {
        client: Option<ClientInfo<'a>>,
        username: &'a str,
        password: &'a str,
    },
    /// Event kinds the bridge does not decode
    Opaque(EventKind),
}

impl EventPayload<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Connect { .. } => EventKind::Connect,
            EventPayload::Disconnect { .. } => EventKind::Disconnect,
            EventPayload::Message { .. } => EventKind::Message,
            EventPayload::BasicAuth { .. } => EventKind::BasicAuth,
            EventPayload::Opaque(kind) => *kind,
        }
    }

    pub fn client(&self) -> Option<&ClientInfo<'_>> {
        match self {
            EventPayload::Connect { client } | EventPayload::Disconnect { client, .. } => {
                Some(client)
            }
            EventPayload::Message { client, .. } | EventPayload::BasicAuth { client, .. } => {
                client.as_ref()
            }
            EventPayload::Opaque(_) => None,
        }
    }
}

/// Changes a handler wants applied to a message event before the broker
/// continues with it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageMutation {
    pub topic: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub qos: Option<u8>,
    pub retain: Option<bool>,
}

impl MessageMutation {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.payload.is_none() && self.qos.is_none() && self.retain.is_none()
    }
}

/// Handler's answer for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReply {
    pub status: StatusCode,
    pub mutation: Option<MessageMutation>,
}

impl EventReply {
    /// Accept the event as-is
    pub fn accept() -> Self {
        Self {
            status: StatusCode::Success,
            mutation: None,
        }
    }

    /// Refuse the event with a broker status (e.g. `AclDenied`, `Auth`)
    pub fn reject(status: StatusCode) -> Self {
        Self {
            status,
            mutation: None,
        }
    }

    /// Leave the decision to the next plugin
    pub fn defer() -> Self {
        Self {
            status: StatusCode::PluginDefer,
            mutation: None,
        }
    }

    /// Accept and rewrite the message
    pub fn mutate(mutation: MessageMutation) -> Self {
        Self {
            status: StatusCode::Success,
            mutation: (!mutation.is_empty()).then_some(mutation),
        }
    }
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// A handler ran and produced a reply
    Handled,
    /// No handler registered, or the instance is not dispatching
    NotHandled,
    /// The handler returned an error or panicked
    Failed,
}

/// Result of dispatching one event, ready to hand back to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub kind: OutcomeKind,
    pub status: StatusCode,
    pub mutation: Option<MessageMutation>,
}

impl DispatchOutcome {
    pub fn handled(reply: EventReply) -> Self {
        Self {
            kind: OutcomeKind::Handled,
            status: reply.status,
            mutation: reply.mutation,
        }
    }

    /// Nobody handled an event of `event`'s kind
    ///
    /// The status is the kind's pass-through status, so an unhandled message
    /// still goes through while an unhandled auth check defers.
    pub fn not_handled(event: EventKind) -> Self {
        Self {
            kind: OutcomeKind::NotHandled,
            status: event.pass_through_status(),
            mutation: None,
        }
    }

    pub fn failed(status: StatusCode) -> Self {
        Self {
            kind: OutcomeKind::Failed,
            status,
            mutation: None,
        }
    }

    pub fn is_not_handled(&self) -> bool {
        self.kind == OutcomeKind::NotHandled
    }
}
