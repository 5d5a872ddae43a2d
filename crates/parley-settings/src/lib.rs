//! # parley-settings
//!
//! Configuration for the Parley transport, message window, and logging.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **User file**: `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PARLEY_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads settings once and hands the
//! relevant sections to the components it builds.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = ParleySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.transport.reconnect_base_delay_ms, 1000);
        assert_eq!(settings.transport.reconnect_max_delay_ms, 30_000);
        assert_eq!(settings.transport.max_reconnect_attempts, 5);
        assert_eq!(settings.transport.keepalive_interval_ms, 30_000);
        assert_eq!(settings.window.window_size, 200);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn re_exports_work() {
        let _path = settings_path();
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
