//! queue-forward options

use mosqbridge::prelude::*;
use std::str::FromStr;
use std::time::Duration;

pub const FAIL_MODE_KEY: &str = "queue_fail_mode";
pub const ENQUEUE_TIMEOUT_KEY: &str = "queue_enqueue_timeout_ms";
pub const BUFFER_KEY: &str = "queue_buffer";
pub const STOP_TIMEOUT_KEY: &str = "queue_stop_timeout_ms";
pub const BACKEND_KEY: &str = "queue_backend";

/// Dispatcher channel capacity when `queue_buffer` is not set
pub const DEFAULT_BUFFER: usize = 4096;

/// Largest accepted `queue_buffer`; the channel reserves its capacity up front
pub const MAX_BUFFER: usize = 1 << 20;

/// The only backend compiled into this plugin
pub const LOG_BACKEND: &str = "log";

pub(crate) const OPTIONS: &[OptionSpec] = &[
    OptionSpec::new(
        FAIL_MODE_KEY,
        OptionKind::Choice(&["drop", "block", "disconnect"]),
    )
    .with_default("drop"),
    OptionSpec::new(ENQUEUE_TIMEOUT_KEY, OptionKind::Millis).with_default("1000"),
    OptionSpec::new(BUFFER_KEY, OptionKind::Integer).with_default("4096"),
    OptionSpec::new(STOP_TIMEOUT_KEY, OptionKind::Millis).with_default("3000"),
    OptionSpec::new(BACKEND_KEY, OptionKind::Choice(&[LOG_BACKEND]))
        .with_default(LOG_BACKEND)
        .with_env("QUEUE_BACKEND"),
];

/// What to tell the broker when a message cannot be forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Let the message through unforwarded
    #[default]
    Drop,
    /// Wait up to the enqueue timeout for room, then deny the message
    Block,
    /// Drop the publishing client's connection
    Disconnect,
}

impl FailMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FailMode::Drop => "drop",
            FailMode::Block => "block",
            FailMode::Disconnect => "disconnect",
        }
    }

    /// Status handed back for a message that was not forwarded
    pub fn status(self) -> StatusCode {
        match self {
            FailMode::Drop => StatusCode::Success,
            FailMode::Block => StatusCode::AclDenied,
            FailMode::Disconnect => StatusCode::ConnLost,
        }
    }
}

impl FromStr for FailMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(FailMode::Drop),
            "block" => Ok(FailMode::Block),
            "disconnect" => Ok(FailMode::Disconnect),
            other => Err(BridgeError::config(
                FAIL_MODE_KEY,
                format!("unknown fail mode '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for FailMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one plugin instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub fail_mode: FailMode,
    pub enqueue_timeout: Duration,
    pub buffer: usize,
    pub stop_timeout: Duration,
    pub backend: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            fail_mode: FailMode::Drop,
            enqueue_timeout: Duration::from_millis(1000),
            buffer: DEFAULT_BUFFER,
            stop_timeout: Duration::from_millis(3000),
            backend: LOG_BACKEND.to_string(),
        }
    }
}

impl QueueConfig {
    /// Read validated options; defaults fill anything missing
    pub fn from_options(options: &PluginOptions) -> BridgeResult<Self> {
        let defaults = Self::default();

        let fail_mode = match options.get_str(FAIL_MODE_KEY) {
            Some(value) => value.parse()?,
            None => defaults.fail_mode,
        };

        let buffer = match options.get::<i64>(BUFFER_KEY) {
            Some(n) if n <= 0 => {
                return Err(BridgeError::config(
                    BUFFER_KEY,
                    format!("must be positive, got {n}"),
                ));
            }
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|&n| n <= MAX_BUFFER)
                .ok_or_else(|| {
                    BridgeError::config(BUFFER_KEY, format!("must be at most {MAX_BUFFER}, got {n}"))
                })?,
            None => defaults.buffer,
        };

        // The option table only lets through backends this build has
        let backend = options
            .get_str(BACKEND_KEY)
            .unwrap_or(LOG_BACKEND)
            .to_string();

        Ok(Self {
            fail_mode,
            enqueue_timeout: options
                .get_duration(ENQUEUE_TIMEOUT_KEY)
                .unwrap_or(defaults.enqueue_timeout),
            buffer,
            stop_timeout: options
                .get_duration(STOP_TIMEOUT_KEY)
                .unwrap_or(defaults.stop_timeout),
            backend,
        })
    }
}
