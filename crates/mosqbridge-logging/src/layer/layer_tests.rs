#![allow(non_snake_case)]

use super::*;
use crate::LogSink;
use parking_lot::Mutex;
use std::sync::Arc;
use test_case::test_case;
use tracing_subscriber::prelude::*;

// Test helper sink
#[derive(Default)]
struct CaptureSink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl LogSink for CaptureSink {
    fn write(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

/// Each test gets its own leaked forwarder so tests never share level or sink
fn capture(level: LogLevel) -> (&'static LogForwarder, Arc<CaptureSink>) {
    let forwarder: &'static LogForwarder = Box::leak(Box::new(LogForwarder::new()));
    forwarder.set_level(level);
    let sink = Arc::new(CaptureSink::default());
    forwarder.set_sink(Some(sink.clone()));
    (forwarder, sink)
}

fn with_layer(forwarder: &'static LogForwarder, f: impl FnOnce()) {
    let subscriber =
        tracing_subscriber::registry().with(BrokerLogLayer::with_forwarder(forwarder));
    tracing::subscriber::with_default(subscriber, f);
}

// BrokerLogLayer tests

#[test_case(Level::TRACE, LogLevel::Trace)]
#[test_case(Level::DEBUG, LogLevel::Debug)]
#[test_case(Level::INFO, LogLevel::Info)]
#[test_case(Level::WARN, LogLevel::Warn)]
#[test_case(Level::ERROR, LogLevel::Error)]
fn BrokerLogLayer___convert_level___maps_tracing_level(level: Level, expected: LogLevel) {
    assert_eq!(BrokerLogLayer::convert_level(&level), expected);
}

#[test]
fn BrokerLogLayer___event___forwards_message() {
    let (forwarder, sink) = capture(LogLevel::Info);

    with_layer(forwarder, || tracing::info!("plugin ready"));

    assert_eq!(
        *sink.records.lock(),
        vec![(LogLevel::Info, "plugin ready".to_string())]
    );
}

#[test]
fn BrokerLogLayer___event_with_fields___appends_sorted_pairs() {
    let (forwarder, sink) = capture(LogLevel::Info);

    with_layer(forwarder, || {
        tracing::warn!(topic = "a/b", qos = 1u8, "enqueue failed");
    });

    let records = sink.records.lock();
    assert_eq!(records[0].0, LogLevel::Warn);
    assert_eq!(records[0].1, "enqueue failed qos=1 topic=a/b");
}

#[test]
fn BrokerLogLayer___event_without_message___renders_fields_only() {
    let (forwarder, sink) = capture(LogLevel::Info);

    with_layer(forwarder, || tracing::info!(count = 3));

    assert_eq!(sink.records.lock()[0].1, "count=3");
}

#[test]
fn BrokerLogLayer___event_below_level___not_forwarded() {
    let (forwarder, sink) = capture(LogLevel::Warn);

    with_layer(forwarder, || tracing::debug!("noise"));

    assert!(sink.records.lock().is_empty());
}

#[test]
fn BrokerLogLayer___level_changed_at_runtime___takes_effect() {
    let (forwarder, sink) = capture(LogLevel::Warn);

    with_layer(forwarder, || {
        for _ in 0..2 {
            tracing::info!("maybe");
            forwarder.set_level(LogLevel::Info);
        }
    });

    assert_eq!(sink.records.lock().len(), 1);
}
