#![allow(non_snake_case)]

use super::*;
use mosqbridge::PluginIdentifier;
use std::sync::{Arc, Barrier};
use std::thread;
use test_case::test_case;

fn context(sample_every: Option<&str>) -> PluginContext {
    let mut options = PluginOptions::new();
    if let Some(every) = sample_every {
        options.insert(SAMPLE_EVERY_KEY, every);
    }
    PluginContext::new(PluginIdentifier::from_raw(0x10), options)
}

fn client(connection: usize, client_id: &str) -> ClientInfo<'_> {
    ClientInfo {
        connection,
        client_id,
        username: "alice",
        peer: "10.0.0.7",
        protocol_version: 5,
    }
}

fn started() -> (ConnEvents, PluginContext) {
    let plugin = ConnEvents::new();
    let ctx = context(None);
    plugin.on_init(&ctx).unwrap();
    (plugin, ctx)
}

// ============================================================================
// ConnectionTracker Tests
// ============================================================================

#[test]
fn ConnectionTracker___take_twice___second_take_is_none() {
    let tracker = ConnectionTracker::new();
    let event = ConnectionEvent::new(ConnectionEventKind::Connect, &client(1, "c1"), None);
    tracker.connect(1, event.clone());

    assert_eq!(tracker.take(1), Some(event));
    assert_eq!(tracker.take(1), None);
    assert!(tracker.is_empty());
}

#[test]
fn ConnectionTracker___reconnect_same_key___replaces_record() {
    let tracker = ConnectionTracker::new();
    let first = ConnectionEvent::new(ConnectionEventKind::Connect, &client(1, "old"), None);
    let second = ConnectionEvent::new(ConnectionEventKind::Connect, &client(1, "new"), None);

    assert!(tracker.connect(1, first.clone()).is_none());
    assert_eq!(tracker.connect(1, second), Some(first));
    assert_eq!(tracker.len(), 1);
}

#[test]
fn ConnectionTracker___concurrent_take___exactly_one_winner() {
    let tracker = Arc::new(ConnectionTracker::new());
    tracker.connect(
        9,
        ConnectionEvent::new(ConnectionEventKind::Connect, &client(9, "c9"), None),
    );
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let tracker = tracker.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                tracker.take(9).is_some()
            })
        })
        .collect();

    let winners = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
}

// ============================================================================
// ConnectionEvent Tests
// ============================================================================

#[test]
fn ConnectionEvent___serialize_connect___omits_reason() {
    let event = ConnectionEvent::new(ConnectionEventKind::Connect, &client(1, "c1"), None);

    let json: serde_json::Value = serde_json::to_value(&event).unwrap();

    assert_eq!(json["event"], "connect");
    assert_eq!(json["client_id"], "c1");
    assert_eq!(json["protocol"], "mqttv5");
    assert!(json.get("reason").is_none());
}

#[test]
fn ConnectionEvent___serialize_anonymous___omits_empty_fields() {
    let anonymous = ClientInfo {
        connection: 2,
        client_id: "c2",
        ..Default::default()
    };
    let event = ConnectionEvent::new(ConnectionEventKind::Disconnect, &anonymous, Some(7));

    let json: serde_json::Value = serde_json::to_value(&event).unwrap();

    assert_eq!(json["event"], "disconnect");
    assert_eq!(json["reason"], 7);
    assert!(json.get("username").is_none());
    assert!(json.get("peer").is_none());
    assert!(json.get("protocol").is_none());
}

// ============================================================================
// ConnEvents Handler Tests
// ============================================================================

#[test]
fn ConnEvents___declares_connect_and_disconnect() {
    let plugin = ConnEvents::new();

    assert_eq!(plugin.events(), &[EventKind::Connect, EventKind::Disconnect]);
    assert_eq!(plugin.options()[0].key, SAMPLE_EVERY_KEY);
}

#[test]
fn ConnEvents___connect___tracks_and_accepts() {
    let (plugin, ctx) = started();

    let reply = plugin
        .handle_event(&ctx, &EventPayload::Connect { client: client(1, "c1") })
        .unwrap();

    assert_eq!(reply, EventReply::accept());
    assert!(plugin.tracker().is_connected(1));
}

#[test]
fn ConnEvents___duplicate_disconnect___accepted_and_untracked() {
    let (plugin, ctx) = started();
    plugin
        .handle_event(&ctx, &EventPayload::Connect { client: client(3, "c3") })
        .unwrap();
    let disconnect = EventPayload::Disconnect {
        client: client(3, "c3"),
        reason: 0,
    };

    let first = plugin.handle_event(&ctx, &disconnect).unwrap();
    let second = plugin.handle_event(&ctx, &disconnect).unwrap();

    assert_eq!(first.status, StatusCode::Success);
    assert_eq!(second.status, StatusCode::Success);
    assert!(plugin.tracker().is_empty());
}

#[test]
fn ConnEvents___disconnect_without_connect___still_success() {
    let (plugin, ctx) = started();

    let reply = plugin
        .handle_event(
            &ctx,
            &EventPayload::Disconnect {
                client: client(44, "ghost"),
                reason: 1,
            },
        )
        .unwrap();

    assert_eq!(reply.status, StatusCode::Success);
}

#[test_case(EventKind::Connect ; "connect")]
#[test_case(EventKind::Disconnect ; "disconnect")]
fn ConnEvents___event_without_client___accepted(kind: EventKind) {
    let (plugin, ctx) = started();

    let reply = plugin.handle_event(&ctx, &EventPayload::Opaque(kind)).unwrap();

    assert_eq!(reply, EventReply::accept());
    assert!(plugin.tracker.is_empty());
}

#[test]
fn ConnEvents___other_event___not_handled() {
    let (plugin, ctx) = started();

    let result = plugin.handle_event(&ctx, &EventPayload::Opaque(EventKind::Tick));

    assert!(matches!(result, Err(BridgeError::NotHandled(EventKind::Tick))));
}

#[test]
fn ConnEvents___on_init___uses_configured_sample_period() {
    let plugin = ConnEvents::new();

    plugin.on_init(&context(Some("4"))).unwrap();

    assert_eq!(plugin.skip_sampler.get().map(Sampler::every), Some(4));
    assert_eq!(plugin.record_sampler.get().map(Sampler::every), Some(4));
}

#[test]
fn ConnEvents___on_init_without_option___uses_default_period() {
    let plugin = ConnEvents::new();

    plugin.on_init(&context(None)).unwrap();

    assert_eq!(
        plugin.skip_sampler.get().map(Sampler::every),
        Some(DEFAULT_SAMPLE_EVERY)
    );
}

#[test]
fn ConnEvents___on_cleanup___forgets_connections() {
    let (plugin, ctx) = started();
    plugin
        .handle_event(&ctx, &EventPayload::Connect { client: client(5, "c5") })
        .unwrap();

    plugin.on_cleanup(&ctx).unwrap();

    assert!(plugin.tracker().is_empty());
}
