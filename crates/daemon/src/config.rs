//! Configuration management for the tvremote daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/tvremote/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("screen dimensions must be positive, got {0}x{1}")]
    InvalidScreen(i32, i32),

    #[error("scroll_gain must not be 0")]
    InvalidScrollGain,

    #[error("cursor_hide_delay_ms must be greater than 0")]
    InvalidHideDelay,

    #[error("max_body_size must be greater than 0")]
    InvalidMaxBodySize,

    #[error("fast_forward_interval_ms must be greater than 0")]
    InvalidFastForward,

    #[error("shell_channel must be a host:port address, got {0}")]
    InvalidShellChannel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the tvremote daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// File browsing and transfer configuration.
    pub files: FilesConfig,

    /// Pointer injection configuration.
    pub input: InputConfig,

    /// Video playback configuration.
    pub play: PlayConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for daemon state (upload staging by default).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,

    /// Maximum request body size in bytes.
    pub max_body_size: u64,
}

/// File browsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Every client-supplied path is confined to this directory.
    pub base_dir: PathBuf,

    /// Where multipart uploads are staged before being moved into place.
    pub upload_temp_dir: Option<PathBuf>,
}

/// Pointer injection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Start the input context with the daemon.
    pub enabled: bool,

    pub screen_width: i32,
    pub screen_height: i32,

    /// Inactivity before the cursor overlay hides itself.
    pub cursor_hide_delay_ms: u64,

    /// Pixels per scroll step.
    pub scroll_gain: i32,
    pub scroll_duration_ms: u64,
    pub tap_duration_ms: u64,
    pub long_press_ms: u64,
    pub swipe_distance: i32,
    pub swipe_duration_ms: u64,

    /// `host:port` of a line-oriented remote shell relay.
    pub shell_channel: Option<String>,

    /// Input tool invoked through the shell relay or spawned directly.
    pub input_program: String,

    /// Platform API level reported by `/mouse/status`.
    pub api_level: u32,
}

/// Video playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayConfig {
    /// Initial fast-forward step in milliseconds.
    pub fast_forward_interval_ms: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 9978,
            max_body_size: 4 * 1024 * 1024 * 1024, // 4GiB
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
            upload_temp_dir: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            screen_width: 1920,
            screen_height: 1080,
            cursor_hide_delay_ms: 5000,
            scroll_gain: 50,
            scroll_duration_ms: 200,
            tap_duration_ms: 50,
            long_press_ms: 600,
            swipe_distance: 400,
            swipe_duration_ms: 300,
            shell_channel: None,
            input_program: "input".to_string(),
            api_level: 0,
        }
    }
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            fast_forward_interval_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// The `bind:port` pair as a string suitable for `TcpListener::bind`.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tvremote")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tvremote")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - TVREMOTE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - TVREMOTE_PORT: Override the listen port
    /// - TVREMOTE_BASE_DIR: Override the file base directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("TVREMOTE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(port) = std::env::var("TVREMOTE_PORT") {
            if !port.is_empty() {
                match port.parse() {
                    Ok(port) => {
                        tracing::info!("Overriding port from environment: {}", port);
                        self.server.port = port;
                    }
                    Err(_) => tracing::warn!("Ignoring invalid TVREMOTE_PORT: {}", port),
                }
            }
        }

        if let Ok(base) = std::env::var("TVREMOTE_BASE_DIR") {
            if !base.is_empty() {
                tracing::info!("Overriding base_dir from environment: {}", base);
                self.files.base_dir = PathBuf::from(base);
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::InvalidMaxBodySize);
        }

        let input = &self.input;
        if input.screen_width <= 0 || input.screen_height <= 0 {
            return Err(ConfigError::InvalidScreen(
                input.screen_width,
                input.screen_height,
            ));
        }

        if input.scroll_gain == 0 {
            return Err(ConfigError::InvalidScrollGain);
        }

        if input.cursor_hide_delay_ms == 0 {
            return Err(ConfigError::InvalidHideDelay);
        }

        if let Some(address) = &input.shell_channel {
            if !is_host_port(address) {
                return Err(ConfigError::InvalidShellChannel(address.clone()));
            }
        }

        if self.play.fast_forward_interval_ms == 0 {
            return Err(ConfigError::InvalidFastForward);
        }

        Ok(())
    }

    /// Directory where uploads are staged.
    pub fn upload_dir(&self) -> PathBuf {
        self.files
            .upload_temp_dir
            .clone()
            .unwrap_or_else(|| self.daemon.data_dir.join("uploads"))
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<()> {
        self.save(default_config_path())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Accepts `ip:port` and `hostname:port` forms.
fn is_host_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains(char::is_whitespace)
                && matches!(port.parse::<u16>(), Ok(p) if p > 0)
        }
        None => false,
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
