//! Init-time plugin options
//!
//! The broker hands the plugin an ordered list of `(key, value)` pairs at
//! init. They are validated against an [`OptionTable`] of recognized keys and
//! copied into [`PluginOptions`], which outlives the broker's option array.

use crate::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One `(key, value)` pair supplied by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Accepted shape of an option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Any string, including empty
    Text,
    /// `true/false/1/0/yes/no/on/off`, case-insensitive
    Bool,
    /// Positive integer number of milliseconds
    Millis,
    /// Signed integer
    Integer,
    /// One of a fixed set of values, case-insensitive; stored lowercase
    Choice(&'static [&'static str]),
}

impl OptionKind {
    /// Normalize `raw` for this kind, or explain why it is invalid
    fn normalize(&self, raw: &str) -> Result<String, String> {
        match self {
            OptionKind::Text => Ok(raw.to_string()),
            OptionKind::Bool => parse_bool(raw)
                .map(|b| b.to_string())
                .ok_or_else(|| "expected a boolean".to_string()),
            OptionKind::Millis => parse_millis(raw)
                .map(|d| d.as_millis().to_string())
                .ok_or_else(|| "expected a positive number of milliseconds".to_string()),
            OptionKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(|v| v.to_string())
                .map_err(|_| "expected an integer".to_string()),
            OptionKind::Choice(choices) => {
                let lowered = raw.trim().to_ascii_lowercase();
                if choices.contains(&lowered.as_str()) {
                    Ok(lowered)
                } else {
                    Err(format!("expected one of {}", choices.join(", ")))
                }
            }
        }
    }
}

/// Policy for a recognized key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    /// Key is recognized but refused; init fails if it is present
    Reject(&'static str),
}

/// Policy for keys the table does not recognize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Skip with a debug log. The broker passes every `plugin_opt_*` line
    /// to every plugin, so this is the usual choice.
    #[default]
    Ignore,
    /// Fail init
    Reject,
}

/// Description of a single recognized option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
    pub default: Option<&'static str>,
    /// Environment variable consulted before the broker's options
    pub env: Option<&'static str>,
    pub required: bool,
    pub disposition: Disposition,
}

impl OptionSpec {
    /// An optional, accepted key with no default
    pub const fn new(key: &'static str, kind: OptionKind) -> Self {
        Self {
            key,
            kind,
            default: None,
            env: None,
            required: false,
            disposition: Disposition::Accept,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn with_env(mut self, env: &'static str) -> Self {
        self.env = Some(env);
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn rejected(mut self, reason: &'static str) -> Self {
        self.disposition = Disposition::Reject(reason);
        self
    }
}

/// Table of recognized options with explicit accept/reject semantics
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    specs: Vec<OptionSpec>,
    unknown: UnknownKeyPolicy,
}

impl OptionTable {
    pub fn new(unknown: UnknownKeyPolicy) -> Self {
        Self {
            specs: Vec::new(),
            unknown,
        }
    }

    /// Add specs; a later spec for the same key replaces the earlier one
    pub fn extend(mut self, specs: &[OptionSpec]) -> Self {
        for spec in specs {
            self.specs.retain(|s| s.key != spec.key);
            self.specs.push(spec.clone());
        }
        self
    }

    pub fn spec(&self, key: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.key == key)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate broker options into an owned [`PluginOptions`]
    ///
    /// Resolution order per key: default, environment, broker options (last
    /// occurrence wins). Invalid values are logged and the previous value is
    /// kept.
    pub fn parse(&self, entries: &[OptionEntry]) -> BridgeResult<PluginOptions> {
        self.parse_with_env(entries, |name| std::env::var(name).ok())
    }

    /// Same as [`parse`](Self::parse) with an injectable environment lookup
    pub fn parse_with_env<F>(&self, entries: &[OptionEntry], env: F) -> BridgeResult<PluginOptions>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = BTreeMap::new();

        for spec in &self.specs {
            if let Some(default) = spec.default {
                values.insert(spec.key.to_string(), default.to_string());
            }
            if let Some(raw) = spec.env.and_then(&env).filter(|v| !v.is_empty()) {
                match spec.kind.normalize(&raw) {
                    Ok(value) => {
                        values.insert(spec.key.to_string(), value);
                    }
                    Err(reason) => tracing::warn!(
                        key = spec.key,
                        value = raw.as_str(),
                        "ignoring invalid environment value: {}",
                        reason
                    ),
                }
            }
        }

        for entry in entries {
            let Some(spec) = self.spec(&entry.key) else {
                match self.unknown {
                    UnknownKeyPolicy::Ignore => {
                        tracing::debug!(key = entry.key.as_str(), "ignoring unknown option");
                        continue;
                    }
                    UnknownKeyPolicy::Reject => {
                        return Err(BridgeError::config(&entry.key, "unknown option"));
                    }
                }
            };

            if let Disposition::Reject(reason) = spec.disposition {
                return Err(BridgeError::config(spec.key, reason));
            }

            match spec.kind.normalize(&entry.value) {
                Ok(value) => {
                    values.insert(spec.key.to_string(), value);
                }
                Err(reason) => tracing::warn!(
                    key = spec.key,
                    value = entry.value.as_str(),
                    kept = values.get(spec.key).map(String::as_str).unwrap_or(""),
                    "ignoring invalid option value: {}",
                    reason
                ),
            }
        }

        for spec in self.specs.iter().filter(|s| s.required) {
            let present = values.get(spec.key).is_some_and(|v| !v.is_empty());
            if !present {
                return Err(BridgeError::config(spec.key, "must be set"));
            }
        }

        Ok(PluginOptions { values })
    }
}

/// Validated options, owned by the plugin context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOptions {
    values: BTreeMap<String, String>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value directly, bypassing the option table
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw (normalized) value for a key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_str(key).and_then(parse_bool)
    }

    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get_str(key).and_then(parse_millis)
    }

    /// Parse a value with [`std::str::FromStr`]
    pub fn get<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get_str(key).and_then(|v| v.parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse a boolean option value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a positive millisecond count into a duration
pub fn parse_millis(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => None,
    }
}
