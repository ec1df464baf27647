#![allow(non_snake_case)]

use super::*;
use parking_lot::Mutex;
use test_case::test_case;

// Test helper sink
#[derive(Default)]
struct CaptureSink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureSink {
    fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().clone()
    }
}

impl LogSink for CaptureSink {
    fn write(&self, level: LogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

struct PanickingSink;

impl LogSink for PanickingSink {
    fn write(&self, _level: LogLevel, _message: &str) {
        panic!("sink exploded");
    }
}

fn forwarder_with_capture() -> (LogForwarder, Arc<CaptureSink>) {
    let forwarder = LogForwarder::new();
    let sink = Arc::new(CaptureSink::default());
    forwarder.set_sink(Some(sink.clone()));
    (forwarder, sink)
}

// LogForwarder tests

#[test]
fn LogForwarder___new___default_level_is_info() {
    let forwarder = LogForwarder::new();

    assert_eq!(forwarder.level(), LogLevel::Info);
}

#[test]
fn LogForwarder___new___no_sink_set() {
    let forwarder = LogForwarder::new();

    assert!(!forwarder.has_sink());
}

#[test]
fn LogForwarder___forward_without_sink___is_silent() {
    let forwarder = LogForwarder::new();

    forwarder.forward(LogLevel::Error, "nobody listening");
}

#[test]
fn LogForwarder___forward___delivers_record() {
    let (forwarder, sink) = forwarder_with_capture();

    forwarder.forward(LogLevel::Warn, "queue almost full");

    assert_eq!(
        sink.records(),
        vec![(LogLevel::Warn, "queue almost full".to_string())]
    );
}

#[test_case(LogLevel::Trace, false)]
#[test_case(LogLevel::Debug, true)]
#[test_case(LogLevel::Info, true)]
#[test_case(LogLevel::Error, true)]
#[test_case(LogLevel::Off, false)]
fn LogForwarder___is_enabled_at_debug___respects_ordering(level: LogLevel, expected: bool) {
    let forwarder = LogForwarder::new();
    forwarder.set_level(LogLevel::Debug);

    assert_eq!(forwarder.is_enabled(level), expected);
}

#[test]
fn LogForwarder___forward_below_level___dropped() {
    let (forwarder, sink) = forwarder_with_capture();
    forwarder.set_level(LogLevel::Warn);

    forwarder.forward(LogLevel::Info, "chatty");

    assert!(sink.records().is_empty());
}

#[test]
fn LogForwarder___level_off___drops_everything() {
    let (forwarder, sink) = forwarder_with_capture();
    forwarder.set_level(LogLevel::Off);

    forwarder.forward(LogLevel::Error, "boom");

    assert!(sink.records().is_empty());
}

#[test]
fn LogForwarder___forward_with_nul___replaces_nul() {
    let (forwarder, sink) = forwarder_with_capture();

    forwarder.forward(LogLevel::Info, "a\0b");

    assert_eq!(sink.records()[0].1, "a\u{FFFD}b");
}

#[test]
fn LogForwarder___panicking_sink___contained() {
    let forwarder = LogForwarder::new();
    forwarder.set_sink(Some(Arc::new(PanickingSink)));

    forwarder.forward(LogLevel::Error, "still fine");

    assert!(forwarder.has_sink());
}

#[test]
fn LogForwarder___set_sink_none___stops_forwarding() {
    let (forwarder, sink) = forwarder_with_capture();

    forwarder.set_sink(None);
    forwarder.forward(LogLevel::Error, "after removal");

    assert!(sink.records().is_empty());
}

#[test]
fn LogForwarder___global___returns_same_instance() {
    let a = LogForwarder::global() as *const LogForwarder;
    let b = LogForwarder::global() as *const LogForwarder;

    assert_eq!(a, b);
}
