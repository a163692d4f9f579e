//! Configuration management for the CraftPanel file service.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/craftpanel/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::export::{DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL};
use crate::files::guard::{is_plain_name, DEFAULT_GLOBAL_SERVER_ID};
use crate::files::ingest::DEFAULT_MAX_UPLOAD_SIZE;

/// Smallest accepted stream chunk size (1KB).
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest accepted stream chunk size (4MB).
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("archive_compression_level must be between 0 and 9, got {0}")]
    InvalidCompressionLevel(u32),

    #[error("stream_chunk_size must be between 1024 and 4194304 bytes, got {0}")]
    InvalidChunkSize(usize),

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("global_server_id must be a single path segment, got {0:?}")]
    InvalidGlobalServerId(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub panel: PanelConfig,

    /// Server file access settings.
    pub files: FilesConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Server file access settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding one folder per server, each with an `mc-data` subfolder.
    pub servers_dir: PathBuf,

    /// Server id that addresses `servers_dir` itself.
    pub global_server_id: String,

    /// Deflate level for directory archives (0 = store).
    pub archive_compression_level: u32,

    /// Chunk size in bytes for streamed downloads and archives.
    pub stream_chunk_size: usize,

    /// Largest accepted upload item in bytes (default: 1GB).
    pub max_upload_size: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            servers_dir: default_servers_dir(),
            global_server_id: DEFAULT_GLOBAL_SERVER_ID.to_string(),
            archive_compression_level: DEFAULT_COMPRESSION_LEVEL,
            stream_chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("craftpanel")
        .join("config.toml")
}

/// Returns the default servers directory.
fn default_servers_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("craftpanel")
        .join("servers")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - CRAFTPANEL_SERVERS_DIR: Override the servers directory
    /// - CRAFTPANEL_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("CRAFTPANEL_SERVERS_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding servers_dir from environment: {}", dir);
                self.files.servers_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("CRAFTPANEL_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.panel.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.panel.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.panel.log_level.clone()));
        }

        if self.files.archive_compression_level > 9 {
            return Err(ConfigError::InvalidCompressionLevel(
                self.files.archive_compression_level,
            ));
        }

        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.files.stream_chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.files.stream_chunk_size));
        }

        if self.files.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(self.files.max_upload_size));
        }

        if !is_plain_name(&self.files.global_server_id) {
            return Err(ConfigError::InvalidGlobalServerId(
                self.files.global_server_id.clone(),
            ));
        }

        Ok(())
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

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
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
