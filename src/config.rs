//! Configuration management for presentd
//!
//! Bootstrap configuration comes from an optional TOML file with built-in
//! defaults; command-line arguments override individual fields. There is no
//! runtime settings tier: everything the sync core needs is known at startup.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP/WebSocket server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory scanned for slideshow JSON files
    #[serde(default = "default_slideshows_dir")]
    pub slideshows_dir: PathBuf,

    /// Fallback display duration for slides without their own timing
    #[serde(default = "default_slide_duration_ms")]
    pub default_slide_duration_ms: u64,

    /// A client that sends nothing for this long is pruned
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Connection slots; connects beyond this are rejected
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            slideshows_dir: default_slideshows_dir(),
            default_slide_duration_ms: default_slide_duration_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            max_clients: default_max_clients(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    50000
}

fn default_slideshows_dir() -> PathBuf {
    PathBuf::from("slideshows")
}

fn default_slide_duration_ms() -> u64 {
    5000
}

fn default_heartbeat_timeout_ms() -> u64 {
    30000
}

fn default_max_clients() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub slideshows_dir: Option<PathBuf>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub slideshows_dir: PathBuf,
    pub default_slide_duration_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub max_clients: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from an optional TOML file and apply overrides.
    ///
    /// A missing file is not an error (defaults apply); an unreadable or
    /// unparseable file is.
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match toml_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let parsed: TomlConfig = toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
                info!("Loaded configuration from {:?}", path);
                parsed
            }
            None => TomlConfig::default(),
        };

        Ok(Config {
            port: overrides.port.unwrap_or(toml_config.port),
            slideshows_dir: overrides
                .slideshows_dir
                .unwrap_or(toml_config.slideshows_dir),
            default_slide_duration_ms: toml_config.default_slide_duration_ms,
            heartbeat_timeout_ms: toml_config.heartbeat_timeout_ms,
            max_clients: toml_config.max_clients,
            log_level: toml_config.logging.level,
        })
    }

    pub fn default_slide_duration(&self) -> Duration {
        Duration::from_millis(self.default_slide_duration_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}
