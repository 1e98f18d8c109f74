//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Channel joined when none was ever requested
pub const DEFAULT_CHANNEL: &str = "lobby";

/// Construction-time settings for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, e.g. `wss://example.net:8443`. Required.
    pub address: String,

    /// Channel to join once connected
    pub desired_channel: Option<String>,

    /// Interval between keepalive pings
    #[serde(rename = "keepalive_interval_ms", with = "duration_millis")]
    pub keepalive_interval: Duration,

    /// Auth token sent with the first handshake only
    pub token: Option<String>,

    /// How long to wait for the transport to open
    #[serde(rename = "connect_timeout_ms", with = "duration_millis")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            desired_channel: None,
            keepalive_interval: Duration::from_millis(20_000),
            token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for `address` with default timings
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_desired_channel(mut self, channel: impl Into<String>) -> Self {
        self.desired_channel = Some(channel.into());
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check the settings a session cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::MissingField("address".to_string()));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "keepalive_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
