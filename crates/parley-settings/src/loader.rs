//! Layered settings: compiled defaults, then `~/.parley/settings.json`,
//! then `PARLEY_*` variables, then [`ParleySettings::validate`].
//!
//! The file only needs the keys it changes. Nested sections merge key by
//! key; a list such as `transport.events` is taken whole from the file, and
//! an explicit `null` leaves the default in place.

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ParleySettings;

/// Resolve the path to the settings file (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ParleySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a result that fails
/// [`ParleySettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let mut settings = read_layers(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layers(path: &Path) -> Result<ParleySettings> {
    let defaults = serde_json::to_value(ParleySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Lay `source` over `target`.
///
/// Objects merge per key, recursively. Anything else in `source` replaces
/// the target value, except `null`, which is ignored.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut base), Value::Object(layer)) => {
            for (key, value) in layer.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, replacement) => replacement,
    }
}

/// Overwrite settings from `PARLEY_*` variables.
///
/// A variable that is unset or empty is skipped. One that is set but out of
/// range or unparseable is skipped with a warning, so the file or default
/// value stays in force.
pub fn apply_env_overrides(settings: &mut ParleySettings) {
    let transport = &mut settings.transport;
    if let Some(url) = env_text("PARLEY_URL") {
        transport.url = url;
    }
    for (name, slot) in [
        ("PARLEY_TENANT_ID", &mut transport.tenant_id),
        ("PARLEY_PROJECT_ID", &mut transport.project_id),
        ("PARLEY_USER_ID", &mut transport.user_id),
    ] {
        if let Some(id) = env_text(name) {
            *slot = Some(id);
        }
    }
    if let Some(n) = env_in_range("PARLEY_MAX_RECONNECT_ATTEMPTS", &(0_u32..=100)) {
        transport.max_reconnect_attempts = n;
    }
    if let Some(ms) = env_in_range("PARLEY_RECONNECT_BASE_DELAY_MS", &(10_u64..=600_000)) {
        transport.reconnect_base_delay_ms = ms;
    }
    if let Some(ms) = env_in_range("PARLEY_RECONNECT_MAX_DELAY_MS", &(10_u64..=3_600_000)) {
        transport.reconnect_max_delay_ms = ms;
    }
    if let Some(ms) = env_in_range("PARLEY_KEEPALIVE_INTERVAL_MS", &(1000_u64..=600_000)) {
        transport.keepalive_interval_ms = ms;
    }

    if let Some(n) = env_in_range("PARLEY_WINDOW_SIZE", &(1_usize..=100_000)) {
        settings.window.window_size = n;
    }
    if let Some(n) = env_in_range("PARLEY_LOAD_MORE_THRESHOLD", &(0_usize..=10_000)) {
        settings.window.load_more_threshold = n;
    }

    if let Some(level) = env_text("PARLEY_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(json) = env_flag("PARLEY_LOG_JSON") {
        settings.logging.json = json;
    }
}

/// Read a switch value. Case does not matter.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and keep it only if it lies in `bounds`.
pub fn parse_in_range<T>(raw: &str, bounds: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim()
        .parse()
        .ok()
        .filter(|n| bounds.contains(n))
}

fn env_text(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env_text(name)?;
    let parsed = parse_flag(&raw);
    if parsed.is_none() {
        warn!(key = name, value = %raw, "ignoring PARLEY override, expected a switch");
    }
    parsed
}

fn env_in_range<T>(name: &str, bounds: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd + Display,
{
    let raw = env_text(name)?;
    let parsed = parse_in_range(&raw, bounds);
    if parsed.is_none() {
        warn!(
            key = name,
            value = %raw,
            min = %bounds.start(),
            max = %bounds.end(),
            "ignoring PARLEY override, not a number in range"
        );
    }
    parsed
}
