//! Transport configuration.

use std::time::Duration;

use parley_core::backoff::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use parley_core::{Backoff, EventAction, SUBSCRIBED_EVENTS, TransportError};
use parley_settings::TransportSettings;
use url::Url;

/// Scope stamped on every outbound frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    /// Tenant.
    pub tenant_id: Option<String>,
    /// Project.
    pub project_id: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
}

/// Runtime configuration for a [`crate::Transport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Endpoint before the token is appended.
    pub url: Url,
    /// Outbound frame scope.
    pub identity: Identity,
    /// First reconnect delay.
    pub reconnect_base_delay: Duration,
    /// Reconnect delay ceiling.
    pub reconnect_max_delay: Duration,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Keepalive `ping` period while connected.
    pub keepalive_interval: Duration,
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Events requested by `subscribe`.
    pub events: Vec<EventAction>,
}

impl TransportConfig {
    /// Defaults for `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            identity: Identity::default(),
            reconnect_base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            reconnect_max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
            keepalive_interval: Duration::from_secs(30),
            send_queue_capacity: 256,
            events: SUBSCRIBED_EVENTS.to_vec(),
        }
    }

    /// Build from loaded settings. Fails only if the URL does not parse.
    pub fn from_settings(settings: &TransportSettings) -> Result<Self, TransportError> {
        let url = Url::parse(&settings.url)
            .map_err(|e| TransportError::Socket(format!("invalid url {:?}: {e}", settings.url)))?;
        Ok(Self {
            url,
            identity: Identity {
                tenant_id: settings.tenant_id.clone(),
                project_id: settings.project_id.clone(),
                user_id: settings.user_id.clone(),
            },
            reconnect_base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            keepalive_interval: Duration::from_millis(settings.keepalive_interval_ms.max(1)),
            send_queue_capacity: settings.send_queue_capacity.max(1),
            events: settings.events.clone(),
        })
    }

    /// Fresh backoff schedule for this configuration.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.reconnect_base_delay,
            self.reconnect_max_delay,
            self.max_reconnect_attempts,
        )
    }
}
