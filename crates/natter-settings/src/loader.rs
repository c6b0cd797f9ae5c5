//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`NatterSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `NATTER_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively, per key
//! - Arrays and primitives in the file replace the default
//! - `null` in the file keeps the default

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, NatterSettings};

/// Resolve the path to the settings file (`~/.natter/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".natter").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<NatterSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Unreadable or malformed files are errors
/// that name the file; out-of-range values are errors that name the key.
pub fn load_settings_from_path(path: &Path) -> Result<NatterSettings> {
    let mut settings = if path.exists() {
        debug!(?path, "loading settings from file");
        read_file(path)?
    } else {
        debug!(?path, "settings file not found, using defaults");
        NatterSettings::default()
    };
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Overlay the file at `path` on the compiled defaults.
fn read_file(path: &Path) -> Result<NatterSettings> {
    let malformed = |source| SettingsError::Json {
        path: path.to_owned(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_owned(),
        source,
    })?;
    let overlay: Value = serde_json::from_str(&content).map_err(malformed)?;
    let mut merged = serde_json::to_value(NatterSettings::default()).map_err(malformed)?;
    deep_merge(&mut merged, overlay);
    serde_json::from_value(merged).map_err(malformed)
}

/// Overlay `source` onto `target` in place.
///
/// Objects merge key by key, anything else replaces the target outright.
/// `null` in `source` leaves the target untouched, so a file can write
/// `"port": null` to keep the default.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Apply `NATTER_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut NatterSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_overrides(settings: &mut NatterSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = env.string("NATTER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.bounded::<u16>("NATTER_PORT", 0..=u16::MAX) {
        settings.server.port = v;
        // Port 0 means "any" for a listener but nothing for a client.
        if v != 0 {
            settings.client.port = v;
        }
    }
    if let Some(v) = env.bounded("NATTER_MAX_CLIENTS", 1..=100_000) {
        settings.server.max_clients = v;
    }
    if let Some(v) = env.bounded("NATTER_READ_BUFFER", 1..=1 << 20) {
        settings.server.read_buffer_bytes = v;
        settings.client.read_buffer_bytes = v;
    }
    if let Some(v) = env.bounded("NATTER_SEND_QUEUE", 1..=1 << 16) {
        settings.server.send_queue = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = env.string("NATTER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("NATTER_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "NATTER_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse `val` as a number inside `bounds`. Surrounding whitespace is allowed.
pub fn parse_bounded<T>(val: &str, bounds: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim()
        .parse()
        .ok()
        .filter(|n| bounds.contains(n))
}

/// Parse `text` or `json` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bounded<T>(&self, name: &str, bounds: RangeInclusive<T>) -> Option<T>
    where
        T: FromStr + PartialOrd + Clone + std::fmt::Debug,
    {
        let val = (self.lookup)(name)?;
        let parsed = parse_bounded(&val, bounds.clone());
        if parsed.is_none() {
            tracing::warn!(key = name, value = %val, ?bounds, "env var out of range, ignoring");
        }
        parsed
    }
}
