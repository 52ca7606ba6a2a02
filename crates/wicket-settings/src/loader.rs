//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WicketSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `WICKET_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::WicketSettings;

/// Resolve the path to the settings file (`~/.wicket/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wicket").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WicketSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<WicketSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<WicketSettings> {
    let defaults = serde_json::to_value(WicketSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: WicketSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `WICKET_*` overrides read through `env`.
///
/// Values that fail to parse or fall outside their range are ignored with a
/// warning, leaving the file/default value in place.
pub fn apply_overrides(settings: &mut WicketSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(v) = read("WICKET_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("WICKET_PORT").and_then(|v| checked("WICKET_PORT", &v, parse_u16)) {
        settings.server.port = v;
    }
    if let Some(v) = read("WICKET_GRACE_PERIOD_MS")
        .and_then(|v| checked("WICKET_GRACE_PERIOD_MS", &v, |s| parse_u64_range(s, 100, 600_000)))
    {
        settings.server.grace_period_ms = v;
    }
    if let Some(v) = read("WICKET_HEARTBEAT_INTERVAL_MS").and_then(|v| {
        checked("WICKET_HEARTBEAT_INTERVAL_MS", &v, |s| {
            parse_u64_range(s, 1000, 600_000)
        })
    }) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = read("WICKET_HEARTBEAT_TIMEOUT_MS").and_then(|v| {
        checked("WICKET_HEARTBEAT_TIMEOUT_MS", &v, |s| {
            parse_u64_range(s, 1000, 3_600_000)
        })
    }) {
        settings.server.heartbeat_timeout_ms = v;
    }
    if let Some(v) = read("WICKET_MAX_CONNECTIONS").and_then(|v| {
        checked("WICKET_MAX_CONNECTIONS", &v, |s| {
            parse_usize_range(s, 2, 1_000_000)
        })
    }) {
        settings.server.max_connections = v;
    }
    if let Some(v) = read("WICKET_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("WICKET_LOG_JSON").and_then(|v| checked("WICKET_LOG_JSON", &v, parse_bool))
    {
        settings.logging.json = v;
    }
}

fn checked<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let result = parse(value);
    if result.is_none() {
        tracing::warn!(key, value, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a port number. `0` is allowed and means "pick a free port".
pub fn parse_u16(val: &str) -> Option<u16> {
    val.parse().ok()
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
