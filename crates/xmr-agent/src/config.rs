//! Agent configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (XMR_CHANNEL, XMR_URL, XMR_KEY)
//! - TOML configuration file, given with `--config` or found on a default path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use xmr_client::{ClientConfig, DISABLED_URL, UNKNOWN_CHANNEL};
use xmr_transport::WebSocketConfig;

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel this player listens on.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Relay URL, or `DISABLED`.
    #[serde(default = "default_url")]
    pub url: String,

    /// CMS key sent in the init frame.
    #[serde(default = "default_key")]
    pub key: String,

    /// Client tuning.
    #[serde(default)]
    pub client: ClientConfig,

    /// WebSocket transport settings.
    #[serde(default)]
    pub websocket: WebSocketSettings,

    /// Status endpoint.
    #[serde(default)]
    pub status: StatusConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// WebSocket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Serve `/health` and `/status`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host to bind to.
    #[serde(default = "default_status_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_status_port")]
    pub port: u16,
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
fn default_channel() -> String {
    std::env::var("XMR_CHANNEL").unwrap_or_else(|_| UNKNOWN_CHANNEL.to_string())
}

fn default_url() -> String {
    std::env::var("XMR_URL").unwrap_or_else(|_| DISABLED_URL.to_string())
}

fn default_key() -> String {
    std::env::var("XMR_KEY").unwrap_or_else(|_| "n/a".to_string())
}

fn default_true() -> bool {
    true
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_connect_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_status_host() -> String {
    "127.0.0.1".to_string()
}

fn default_status_port() -> u16 {
    9696
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            url: default_url(),
            key: default_key(),
            client: ClientConfig::default(),
            websocket: WebSocketSettings::default(),
            status: StatusConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_status_host(),
            port: default_status_port(),
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

impl WebSocketSettings {
    /// Transport configuration for the WebSocket connector.
    #[must_use]
    pub fn to_transport_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.max_message_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

impl StatusConfig {
    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form an address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid status address: {}:{}", self.host, self.port))
    }
}

impl Config {
    /// Load configuration from `path`, else the first default path found,
    /// else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen config file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        // Try to load from default paths
        let config_paths = ["xmr.toml", "/etc/xmr/xmr.toml", "~/.config/xmr/xmr.toml"];

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
}
