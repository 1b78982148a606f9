//! Configuration management for the virtual SD card.
//!
//! Handles loading configuration from TOML files, with command-line overrides
//! for the card directory and part sorting.

use crate::error::{Result, SdError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Card directory and part handling.
    #[serde(default)]
    pub virtual_sdcard: SdCardConfig,

    /// Work loop tuning.
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Card directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SdCardConfig {
    /// Directory holding the printable files. `~` is expanded.
    pub path: Option<PathBuf>,

    /// Sort discovered parts by name instead of file order.
    #[serde(default)]
    pub sort_part_names: bool,
}

/// Work loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bytes read from the file per refill.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Poll interval used by `pause()` while waiting for the loop to stop.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// How long the loop backs off while other command traffic is pending.
    #[serde(default = "default_busy_backoff_ms")]
    pub busy_backoff_ms: u64,
}

fn default_block_size() -> usize {
    8192
}

fn default_pause_poll_ms() -> u64 {
    1
}

fn default_busy_backoff_ms() -> u64 {
    100
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            pause_poll_ms: default_pause_poll_ms(),
            busy_backoff_ms: default_busy_backoff_ms(),
        }
    }
}

impl StreamConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SdError::config("stream.block_size must be greater than 0"));
        }
        Ok(())
    }
}

impl SdCardConfig {
    /// Returns the card directory with `~` expanded and `.`/`..` folded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let raw = self
            .path
            .as_deref()
            .ok_or_else(|| SdError::config("virtual_sdcard.path is required (or pass --path)"))?;
        Ok(normalize_path(&expand_tilde(raw)))
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("virtual-sd")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SdError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            SdError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.stream.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides. Flags only ever turn options on.
    pub fn apply_overrides(&mut self, path: Option<&Path>, sort_part_names: bool) {
        if let Some(path) = path {
            self.virtual_sdcard.path = Some(path.to_path_buf());
        }
        if sort_part_names {
            self.virtual_sdcard.sort_part_names = true;
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Lexical normalization, like `os.path.normpath`: no filesystem access.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
