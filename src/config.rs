//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the clock-config.toml file.
//! It provides a centralized way to configure poll intervals, lock timeouts, the headless
//! display size and where preferences are stored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "clock-config.toml";

/// Application configuration loaded from clock-config.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Timer intervals and lock budgets
    pub schedule: ScheduleConfig,
    /// Display and formatting
    pub display: DisplayConfig,
    /// Preference storage
    pub preferences: PreferencesConfig,
}

/// Where the refresh tick learns the current sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncCheck {
    /// A separate sync-poll task posts samples that the refresh tick consumes
    Polled,
    /// The refresh tick samples the time source itself
    Inline,
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Visual refresh period in milliseconds
    pub refresh_interval_ms: u64,
    /// Sync-status poll period in milliseconds (1-5 s is plenty)
    pub sync_poll_interval_ms: u64,
    /// Lock budget for a routine refresh tick
    pub tick_lock_timeout_ms: u64,
    /// Lock budget for rebuilds, mode toggles and clicks
    pub rebuild_lock_timeout_ms: u64,
    /// Polled (deferred flag) or inline sync detection
    pub sync_check: SyncCheck,
}

/// Display and formatting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Container width in pixels
    pub width: u32,
    /// Container height in pixels
    pub height: u32,
    /// Initial value of the host's 24-hour time format setting
    pub use_24_hour: bool,
}

/// Preference storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// TOML file holding the persisted display mode
    pub path: PathBuf,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            refresh_interval_ms: 1000,
            sync_poll_interval_ms: 2000,
            tick_lock_timeout_ms: 50,
            rebuild_lock_timeout_ms: 1000,
            sync_check: SyncCheck::Polled,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 320, // 2.4" panel, landscape
            height: 240,
            use_24_hour: true,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        PreferencesConfig {
            path: PathBuf::from("clock-prefs.toml"),
        }
    }
}

impl ScheduleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms.max(1))
    }

    pub fn tick_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_lock_timeout_ms)
    }

    pub fn rebuild_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.rebuild_lock_timeout_ms)
    }
}

impl Config {
    /// Load configuration from clock-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config file format, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to `path`
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "Configuration saved");
        Ok(())
    }
}
