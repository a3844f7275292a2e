//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `detection.toml` in the working directory, then `DETECTION__*`
//! environment variables (`DETECTION__SERVICE__POLL_INTERVAL_MS=1000`).

use config::{Config, ConfigError, Environment, File};
use detection_protocol::ClientConfig;
use detection_service::ServiceConfig;
use serde::Deserialize;

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG` when set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Detection backend connection
    pub source: ClientConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
    /// Use the terminal bell and stderr notifications when available
    pub notifications: bool,
    /// Start polling at launch with this credential
    pub credential: Option<String>,
}

impl AppConfig {
    /// Load from `detection.toml` (optional) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("detection")
    }

    /// Load with `file` as the base name of the optional config file
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("DETECTION")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
