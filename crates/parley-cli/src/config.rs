//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PARLEY_*)
//! - TOML configuration file
//! - Command line arguments, applied on top by `main`

use anyhow::{Context, Result};
use parley_core::{Avatar, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the chat server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Lobby defaults.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Session behaviour.
    #[serde(default)]
    pub session: SessionSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Lobby defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Nickname to prefill.
    #[serde(default = "default_nickname")]
    pub nickname: Option<String>,

    /// Avatar to preselect: glyph, name, or palette number as a string.
    #[serde(default)]
    pub avatar: Avatar,
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Quiet period before typing stops, in milliseconds.
    #[serde(default = "default_typing_window")]
    pub typing_window_ms: u64,

    /// Show our own messages immediately instead of waiting for the echo.
    #[serde(default)]
    pub local_echo: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_server_url() -> String {
    std::env::var("PARLEY_SERVER").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string())
}

fn default_nickname() -> Option<String> {
    std::env::var("PARLEY_NICKNAME").ok()
}

fn default_typing_window() -> u64 {
    2_000 // 2 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            log_file: None,
            profile: ProfileConfig::default(),
            session: SessionSection::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            avatar: Avatar::default(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            typing_window_ms: default_typing_window(),
            local_echo: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default paths, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` cannot be read, or if any
    /// config file found cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        // Try to load from default paths
        let config_paths = ["parley.toml", "~/.config/parley/parley.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Session settings for the client loop.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            typing_window: Duration::from_millis(self.session.typing_window_ms),
            local_echo: self.session.local_echo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.typing_window_ms, 2_000);
        assert!(!config.session.local_echo);
        assert!(!config.metrics.enabled);
        assert_eq!(config.profile.avatar, Avatar::Robot);
    }

    #[test]
    fn test_session_config() {
        let config = Config::default();
        let session = config.session_config();
        assert_eq!(session.typing_window, Duration::from_secs(2));
        assert!(!session.local_echo);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            server_url = "wss://chat.example.com/ws"

            [profile]
            nickname = "Ann"
            avatar = "cat"

            [session]
            typing_window_ms = 1500
            local_echo = true

            [metrics]
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_url, "wss://chat.example.com/ws");
        assert_eq!(config.profile.nickname.as_deref(), Some("Ann"));
        assert_eq!(config.profile.avatar, Avatar::Cat);
        assert_eq!(config.session.typing_window_ms, 1500);
        assert!(config.session.local_echo);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_config_rejects_unknown_avatar() {
        let toml_str = r#"
            [profile]
            avatar = "unicorn"
        "#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(Config::load(Some(Path::new("/nonexistent/parley.toml"))).is_err());
    }
}
