//! Settings type definitions.
//!
//! All types use camelCase JSON keys and `#[serde(default)]`, so a settings
//! file only needs the keys it overrides.

use parley_core::backoff::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use parley_core::{EventAction, SUBSCRIBED_EVENTS};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "transport": { "url": "wss://chat.example.com/ws", "tenantId": "acme" },
///   "window": { "windowSize": 500 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Realtime transport settings.
    pub transport: TransportSettings,
    /// Message window settings.
    pub window: WindowSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Reject values the components cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("transport.url is empty".into()));
        }
        if t.keepalive_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "transport.keepaliveIntervalMs must be positive".into(),
            ));
        }
        if t.reconnect_base_delay_ms > t.reconnect_max_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "transport.reconnectBaseDelayMs ({}) exceeds reconnectMaxDelayMs ({})",
                t.reconnect_base_delay_ms, t.reconnect_max_delay_ms
            )));
        }
        if t.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "transport.sendQueueCapacity must be positive".into(),
            ));
        }
        if self.window.window_size == 0 {
            return Err(SettingsError::InvalidValue(
                "window.windowSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Realtime transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// WebSocket endpoint. The auth token is appended as `?token=`.
    pub url: String,
    /// Tenant stamped on outbound frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Project stamped on outbound frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// User stamped on outbound frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// First reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay ceiling in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Reconnect attempts before settling at `Disconnected`.
    pub max_reconnect_attempts: u32,
    /// Keepalive `ping` interval in milliseconds.
    pub keepalive_interval_ms: u64,
    /// Outbound frames buffered between `send` and the socket writer.
    pub send_queue_capacity: usize,
    /// Events requested by the automatic `subscribe` on connect.
    pub events: Vec<EventAction>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            tenant_id: None,
            project_id: None,
            user_id: None,
            reconnect_base_delay_ms: DEFAULT_BASE_DELAY_MS,
            reconnect_max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
            keepalive_interval_ms: 30_000,
            send_queue_capacity: 256,
            events: SUBSCRIBED_EVENTS.to_vec(),
        }
    }
}

/// Message window settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowSettings {
    /// Maximum number of messages held in memory.
    pub window_size: usize,
    /// Distance from a window edge (in messages) at which the next page is requested.
    pub load_more_threshold: usize,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            window_size: 200,
            load_more_threshold: 10,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (e.g. `"info"`, `"parley_transport=debug"`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ParleySettings =
            serde_json::from_str(r#"{"window": {"windowSize": 50}}"#).unwrap();
        assert_eq!(settings.window.window_size, 50);
        assert_eq!(settings.window.load_more_threshold, 10);
        assert_eq!(settings.transport.max_reconnect_attempts, 5);
    }

    #[test]
    fn events_serialize_as_wire_names() {
        let value = serde_json::to_value(TransportSettings::default()).unwrap();
        assert_eq!(value["events"][0], "chat.message.sent");
        assert!(value.get("tenantId").is_none());
    }

    #[test]
    fn zero_window_rejected() {
        let mut settings = ParleySettings::default();
        settings.window.window_size = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn inverted_delays_rejected() {
        let mut settings = ParleySettings::default();
        settings.transport.reconnect_base_delay_ms = 60_000;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn zero_keepalive_rejected() {
        let mut settings = ParleySettings::default();
        settings.transport.keepalive_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
