//! Core error types for Chorus

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the Chorus client
#[derive(Error, Debug)]
pub enum ChorusError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session task has stopped and no longer accepts requests
    #[error("Session is closed")]
    SessionClosed,
}

/// Transport-related errors. All of them end the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Address could not be turned into a connection request
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Handshake with the server failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The transport did not report `opened` in time
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Read or write failure on an open connection
    #[error("I/O error: {0}")]
    Io(String),

    /// Operation requires an open transport
    #[error("Transport is not open")]
    NotOpen,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chorus_error_wraps_session_facing_errors() {
        let err = ChorusError::from(TransportError::NotOpen);
        assert!(matches!(err, ChorusError::Transport(TransportError::NotOpen)));
        assert_eq!(err.to_string(), "Transport error: Transport is not open");

        let err = ChorusError::from(ConfigError::MissingField("address".to_string()));
        assert!(matches!(err, ChorusError::Config(ConfigError::MissingField(_))));
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field: address"
        );

        assert_eq!(ChorusError::SessionClosed.to_string(), "Session is closed");
    }

    #[test]
    fn test_connect_timeout_display() {
        let err = TransportError::ConnectTimeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "Connection timed out after 3s");
    }
}
