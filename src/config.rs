//! Configuration loading and management
//!
//! Handles parsing of `.boardsync.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Name of the configuration file looked up next to the board
pub const CONFIG_FILE: &str = ".boardsync.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cross-container move guard
    #[serde(default)]
    pub guard: GuardConfig,

    /// Board document storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Cross-container move guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Window during which reversing the last container move is refused
    #[serde(default = "default_cooldown")]
    pub cooldown: String,
}

fn default_cooldown() -> String {
    "50ms".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
        }
    }
}

impl GuardConfig {
    pub fn cooldown(&self) -> Result<Duration> {
        parse_duration(&self.cooldown)
            .map_err(|err| Error::InvalidConfig(format!("guard.cooldown: {err}")))
    }
}

/// Board storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the board document, relative to the config file
    #[serde(default = "default_board")]
    pub board: PathBuf,

    /// How long to wait for the board lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_board() -> PathBuf {
    PathBuf::from("board.json")
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            board: default_board(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Parse durations like `50ms`, `2s`, `5m`, `1h`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let raw = s.trim();
    let split = raw
        .find(|ch: char| !ch.is_ascii_digit())
        .ok_or_else(|| Error::InvalidArgument(format!("duration '{raw}' needs a unit (ms, s, m, h)")))?;
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        return Err(Error::InvalidArgument(format!("duration '{raw}' has no amount")));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid duration amount in '{raw}'")))?;
    let too_large = || Error::InvalidArgument(format!("duration '{raw}' is too large"));
    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount.checked_mul(60).ok_or_else(too_large)?)),
        "h" => Ok(Duration::from_secs(amount.checked_mul(3600).ok_or_else(too_large)?)),
        _ => Err(Error::InvalidArgument(format!(
            "unknown duration unit '{unit}' in '{raw}' (expected ms|s|m|h)"
        ))),
    }
}

impl Config {
    /// Load configuration from a `.boardsync.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.boardsync.toml` from `dir`, or return defaults if it is missing
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let cooldown = self.guard.cooldown()?;
        if cooldown > Duration::from_secs(5) {
            return Err(Error::InvalidConfig(
                "guard.cooldown must be at most 5s".to_string(),
            ));
        }
        if self.storage.board.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.board cannot be empty".to_string(),
            ));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
