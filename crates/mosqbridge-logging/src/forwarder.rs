//! Broker log forwarding

use mosqbridge_core::LogLevel;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Destination for forwarded log records
///
/// Implementations are called synchronously from whatever thread logged, so
/// they must be cheap and must not log through [`LogForwarder`] themselves.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

/// Global log forwarder
static FORWARDER: OnceCell<LogForwarder> = OnceCell::new();

/// Level-filtered, one-shot forwarding of log records to a [`LogSink`]
///
/// There is no queue: a record either reaches the sink during the call or is
/// dropped. Forwarding never fails from the caller's point of view.
pub struct LogForwarder {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    level: AtomicU8,
}

impl LogForwarder {
    /// Create a forwarder with no sink and level `Info`
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
            level: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    /// Get the global forwarder instance
    pub fn global() -> &'static LogForwarder {
        FORWARDER.get_or_init(LogForwarder::new)
    }

    /// Install or remove the sink
    pub fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        *self.sink.write() = sink;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    /// Check if a record at `level` would be forwarded
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level()
    }

    /// Forward one record
    ///
    /// Silently does nothing when the level is filtered out or no sink is
    /// installed. Interior NULs are replaced since the broker treats the
    /// message as a C string. A panicking sink is contained here.
    pub fn forward(&self, level: LogLevel, message: &str) {
        if !self.is_enabled(level) {
            return;
        }

        // Clone out so the lock is not held while the sink runs
        let Some(sink) = self.sink.read().clone() else {
            return;
        };

        let message = sanitize(message);
        let _ = catch_unwind(AssertUnwindSafe(|| sink.write(level, &message)));
    }
}

impl Default for LogForwarder {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(message: &str) -> Cow<'_, str> {
    if message.contains('\0') {
        Cow::Owned(message.replace('\0', "\u{FFFD}"))
    } else {
        Cow::Borrowed(message)
    }
}

#[cfg(test)]
#[path = "forwarder/forwarder_tests.rs"]
mod forwarder_tests;
