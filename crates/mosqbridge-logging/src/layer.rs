//! Tracing layer that forwards to the broker log

use crate::forwarder::LogForwarder;
use mosqbridge_core::LogLevel;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Tracing layer that forwards log events through a [`LogForwarder`]
///
/// Events are rendered as `message key=value ...` with fields sorted by key
/// so the broker log stays grep-friendly.
pub struct BrokerLogLayer {
    forwarder: &'static LogForwarder,
}

impl BrokerLogLayer {
    /// Create a layer using the global forwarder
    pub fn new() -> Self {
        Self {
            forwarder: LogForwarder::global(),
        }
    }

    /// Create a layer with a specific forwarder
    pub fn with_forwarder(forwarder: &'static LogForwarder) -> Self {
        Self { forwarder }
    }

    fn convert_level(level: &Level) -> LogLevel {
        match *level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl Default for BrokerLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for BrokerLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // The level can change at runtime, so callsite interest must not be cached
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.forwarder
            .is_enabled(Self::convert_level(metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = Self::convert_level(event.metadata().level());
        if !self.forwarder.is_enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.forwarder.forward(level, &visitor.render());
    }
}

/// Collects the message and the remaining fields of an event
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<&'static str, String>,
}

impl FieldVisitor {
    fn render(self) -> String {
        let mut out = self.message.unwrap_or_default();
        for (key, value) in self.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{key}={value}");
        }
        out
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.insert(field.name(), format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name(), value.to_string());
        }
    }
}

/// Initialize the logging system with the broker layer
///
/// Installs the layer as the global subscriber. Later calls, or a subscriber
/// already installed by the host process, leave the existing one in place.
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    let subscriber = tracing_subscriber::registry().with(BrokerLogLayer::new());
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
#[path = "layer/layer_tests.rs"]
mod layer_tests;
