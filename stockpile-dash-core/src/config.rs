//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/stockpile-dash/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/stockpile-dash/` (~/.config/stockpile-dash/)
//! - State/Logs: `$XDG_STATE_HOME/stockpile-dash/` (~/.local/state/stockpile-dash/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Sub-path the Stockpile server mounts its UI push channel on.
pub const DEFAULT_CHANNEL_PATH: &str = "/ui/socket.io";

/// Address of a Stockpile server started with its default bind settings.
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:36623";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Push channel target
    #[serde(default)]
    pub server: ServerConfig,

    /// Event history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Push channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// `host[:port]` of the Stockpile server
    #[serde(default = "default_server_address")]
    pub address: String,

    /// Sub-path of the Socket.IO endpoint
    #[serde(default = "default_channel_path")]
    pub path: String,

    /// Use `wss://` instead of `ws://`
    #[serde(default)]
    pub secure: bool,

    /// Engine.IO protocol revision spoken by the server (3 or 4)
    #[serde(default = "default_engine_io")]
    pub engine_io: u8,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            path: default_channel_path(),
            secure: false,
            engine_io: default_engine_io(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config("server.address must not be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(Error::Config(format!(
                "server.path must start with '/', got {:?}",
                self.path
            )));
        }
        if !matches!(self.engine_io, 3 | 4) {
            return Err(Error::Config(format!(
                "server.engine_io must be 3 or 4, got {}",
                self.engine_io
            )));
        }
        if self.reconnect_initial_ms == 0 {
            return Err(Error::Config(
                "server.reconnect_initial_ms must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(Error::Config(
                "server.reconnect_initial_ms must not exceed server.reconnect_max_ms".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_server_address() -> String {
    DEFAULT_SERVER_ADDRESS.to_string()
}

fn default_channel_path() -> String {
    DEFAULT_CHANNEL_PATH.to_string()
}

fn default_engine_io() -> u8 {
    3
}

fn default_reconnect_initial_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    10_000
}

/// Event history configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Eviction threshold; the history settles at `capacity + 1` entries
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    crate::history::DEFAULT_CAPACITY
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.server.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/stockpile-dash/config.toml` (~/.config/stockpile-dash/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("stockpile-dash").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/stockpile-dash/` (~/.local/state/stockpile-dash/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("stockpile-dash")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("stockpile-dash.log")
    }
}
