//! Configuration loading for duel-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for duel-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Room configuration.
    #[serde(default)]
    pub rooms: RoomsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Players admitted per room (default: 2).
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Seconds between relay heartbeats (default: 15).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Frames buffered per room before a slow connection starts dropping
    /// them (default: 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl RoomsConfig {
    /// The heartbeat interval as a [`Duration`], at least one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_players() -> usize {
    2
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
