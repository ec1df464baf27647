//! Plugin instance identity and shared per-instance state

use crate::{LogLevel, PluginOptions};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Opaque broker handle identifying one plugin instance
///
/// The broker owns the underlying object; this is only its address, kept
/// for registration calls and for finding the instance again from callback
/// `userdata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginIdentifier(usize);

impl PluginIdentifier {
    /// Wrap a broker-supplied pointer; `None` if null
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr as usize))
    }

    /// Build an identifier from a raw address (tests, diagnostics)
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PluginIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Lock-free dispatch counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    handled: AtomicU64,
    not_handled: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_handled(&self) {
        self.not_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn not_handled(&self) -> u64 {
        self.not_handled.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Plugin-private state for one instance
///
/// Created during init before any event is attached and dropped after the
/// last registration is removed. Every dispatch receives it by reference.
/// Options are immutable once the context exists; counters are atomics, so
/// the context itself needs no lock.
pub struct PluginContext {
    identifier: PluginIdentifier,
    options: PluginOptions,
    log_level: LogLevel,
    drain_timeout: Duration,
    stats: DispatchStats,
    created_at: Instant,
}

impl PluginContext {
    /// Option key for the forwarded log level
    pub const LOG_LEVEL_KEY: &'static str = "log_level";
    /// Option key for the cleanup drain bound
    pub const DRAIN_TIMEOUT_KEY: &'static str = "drain_timeout_ms";
    /// Default cleanup drain bound
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(5000);

    pub fn new(identifier: PluginIdentifier, options: PluginOptions) -> Self {
        let log_level = options
            .get_str(Self::LOG_LEVEL_KEY)
            .and_then(LogLevel::from_name)
            .unwrap_or(LogLevel::Info);
        let drain_timeout = options
            .get_duration(Self::DRAIN_TIMEOUT_KEY)
            .unwrap_or(Self::DEFAULT_DRAIN_TIMEOUT);

        Self {
            identifier,
            options,
            log_level,
            drain_timeout,
            stats: DispatchStats::default(),
            created_at: Instant::now(),
        }
    }

    pub fn identifier(&self) -> PluginIdentifier {
        self.identifier
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("identifier", &self.identifier)
            .field("options", &self.options)
            .field("log_level", &self.log_level)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}
