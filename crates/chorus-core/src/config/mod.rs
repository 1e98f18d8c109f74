//! Configuration management for Chorus

mod client;
pub mod serde_utils;

pub use client::{ClientConfig, DEFAULT_CHANNEL};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chorus")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_load_client_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
address = "wss://example.net:8443"
desired_channel = "practice"
keepalive_interval_ms = 15000
"#,
        )
        .unwrap();

        let config: ClientConfig = load_config(&path).unwrap();
        assert_eq!(config.address, "wss://example.net:8443");
        assert_eq!(config.desired_channel.as_deref(), Some("practice"));
        assert_eq!(config.keepalive_interval, Duration::from_millis(15000));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = load_config::<ClientConfig>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "address = [").unwrap();

        let err = load_config::<ClientConfig>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_default_config_path_file_name() {
        assert!(default_config_path().ends_with("chorus/client.toml"));
    }
}
