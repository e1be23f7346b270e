// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timers: TimersConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    /// Milliseconds between ticks of the single ticking authority.
    pub tick_interval_ms: u64,
    /// A running timer at or below this many seconds is "urgent".
    pub urgent_threshold_secs: u32,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            urgent_threshold_secs: 30,
        }
    }
}

impl TimersConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the session API.
    pub base_url: String,
    /// Fixed per-request timeout, matching the app-wide HTTP contract.
    pub request_timeout_secs: u64,
    /// Retry a failed request exactly once when the failure is transient.
    pub retry_once: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.chefkix.app".into(),
            request_timeout_secs: 15,
            retry_once: true,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub sound: bool,
    pub vibration: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            vibration: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the state directory; defaults to the platform path.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> Result<Self, crate::infra::errors::SessionError> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, crate::infra::errors::SessionError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::infra::errors::SessionError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.timers.tick_interval_ms, 1_000);
        assert_eq!(c.timers.urgent_threshold_secs, 30);
        assert_eq!(c.gateway.request_timeout_secs, 15);
        assert!(c.gateway.retry_once);
        assert!(c.notifications.enabled);
        assert!(c.notifications.sound);
        assert!(c.storage.dir.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [timers]
            tick_interval_ms = 500
            urgent_threshold_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(parsed.timers.tick_interval_ms, 500);
        assert_eq!(parsed.timers.urgent_threshold_secs, 10);
        // Untouched sections fall back to defaults
        assert_eq!(parsed.gateway.base_url, "https://api.chefkix.app");
        assert!(parsed.notifications.vibration);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timers = \"not a table\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::infra::errors::SessionError::Config(_)
        ));
    }

    #[test]
    fn test_durations() {
        let c = Config::default();
        assert_eq!(c.timers.tick_interval(), Duration::from_millis(1_000));
        assert_eq!(c.gateway.request_timeout(), Duration::from_secs(15));
    }
}
