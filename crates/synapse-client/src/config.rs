//! Client configuration file support.
//!
//! Configuration is layered: built-in defaults, then `~/.synapse/config.toml`,
//! then `./.synapserc`, then `SYNAPSE_*` environment variables. Callers apply
//! command-line overrides last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::backoff::Backoff;

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
/// Default event-stream base URL.
pub const DEFAULT_WEBSOCKET_URL: &str = "http://localhost:8000";

/// Transports an event connection may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP long-polling.
    Polling,
    /// WebSocket.
    Websocket,
}

impl TransportKind {
    /// Wire name used in the `transport` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Websocket => "websocket",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event-stream connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Ordered transport preference.
    pub transports: Vec<TransportKind>,
    /// Endpoint path on the event-stream server.
    pub path: String,
    /// Namespace joined after the handshake.
    pub namespace: String,
    /// Per-attempt connection timeout.
    pub connect_timeout_ms: u64,
    /// Whether lost connections are re-established automatically.
    pub reconnection: bool,
    /// Reconnection attempts before giving up.
    pub reconnection_attempts: u32,
    /// Base reconnection delay.
    pub reconnection_delay_ms: u64,
    /// Reconnection delay cap.
    pub reconnection_delay_max_ms: u64,
    /// Jitter applied to each delay, in `[0, 1]`.
    pub randomization_factor: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::Polling, TransportKind::Websocket],
            path: "/socket.io/".to_string(),
            namespace: "/".to_string(),
            connect_timeout_ms: 60_000,
            reconnection: true,
            reconnection_attempts: 10,
            reconnection_delay_ms: 2_000,
            reconnection_delay_max_ms: 10_000,
            randomization_factor: 0.5,
        }
    }
}

impl TransportConfig {
    /// Connection timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Backoff policy derived from the reconnection settings.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnection_delay_ms),
            Duration::from_millis(self.reconnection_delay_max_ms),
            self.randomization_factor,
        )
    }
}

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Event-stream base URL.
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Event-stream transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Keepalive period while connected.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_websocket_url() -> String {
    DEFAULT_WEBSOCKET_URL.to_string()
}

const fn default_keepalive_interval_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            websocket_url: default_websocket_url(),
            log_level: None,
            transport: TransportConfig::default(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

/// Partial configuration as found in a file. Absent keys leave lower layers alone.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigLayer {
    api_url: Option<String>,
    websocket_url: Option<String>,
    log_level: Option<String>,
    transport: Option<toml::Table>,
    keepalive_interval_secs: Option<u64>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl ClientConfig {
    /// Load a complete configuration from a TOML file; missing keys take defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = read_config(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME").map_or_else(|_| PathBuf::from("."), PathBuf::from).join(".synapse").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".synapserc")
    }

    /// Discover and load configuration from the default locations and environment.
    ///
    /// Missing files are skipped. Unreadable or malformed files are errors.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let mut config = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.exists() {
                config.merge_file(&path)?;
            }
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge the keys present in a TOML file over this configuration.
    pub fn merge_file(&mut self, path: &Path) -> ConfigResult<()> {
        let content = read_config(path)?;
        let layer: ConfigLayer =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

        if let Some(api_url) = layer.api_url {
            self.api_url = api_url;
        }
        if let Some(websocket_url) = layer.websocket_url {
            self.websocket_url = websocket_url;
        }
        if let Some(log_level) = layer.log_level {
            self.log_level = Some(log_level);
        }
        if let Some(secs) = layer.keepalive_interval_secs {
            self.keepalive_interval_secs = secs;
        }
        if let Some(overrides) = layer.transport {
            let current = toml::Value::try_from(&self.transport)
                .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {e}")))?;
            let toml::Value::Table(mut table) = current else {
                return Err(ConfigError::ParseError("transport settings are not a table".to_string()));
            };
            table.extend(overrides);
            self.transport = toml::Value::Table(table)
                .try_into()
                .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
        }
        Ok(())
    }

    /// Apply `SYNAPSE_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_url) = lookup("SYNAPSE_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = api_url;
        }
        if let Some(websocket_url) = lookup("SYNAPSE_WEBSOCKET_URL").filter(|v| !v.is_empty()) {
            self.websocket_url = websocket_url;
        }
        if let Some(log_level) = lookup("SYNAPSE_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log_level = Some(log_level);
        }
    }

    /// Check values the connection layer relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [("api_url", &self.api_url), ("websocket_url", &self.websocket_url)] {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidValue(format!("{name} '{value}': {e}")))?;
        }

        let transport = &self.transport;
        if transport.transports.is_empty() {
            return Err(ConfigError::InvalidValue("transports must not be empty".to_string()));
        }
        if transport.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("connect_timeout_ms must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&transport.randomization_factor) {
            return Err(ConfigError::InvalidValue(format!(
                "randomization_factor must be within [0, 1], got {}",
                transport.randomization_factor
            )));
        }
        if transport.reconnection_delay_ms > transport.reconnection_delay_max_ms {
            return Err(ConfigError::InvalidValue(format!(
                "reconnection_delay_ms ({}) exceeds reconnection_delay_max_ms ({})",
                transport.reconnection_delay_ms, transport.reconnection_delay_max_ms
            )));
        }
        if self.keepalive_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("keepalive_interval_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Keepalive period as a `Duration`.
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

fn read_config(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(format!("{}: {e}", path.display())))
}
