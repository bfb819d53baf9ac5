//! Configuration for the monitor
//!
//! Loaded from `~/.config/arctis-monitor/config.toml` when present. Every
//! field has a default, so an empty or partial file is valid. The poll
//! cadence is part of the device protocol and is not configurable.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use arctis_transport::protocol::{device, timing};
use serde::{Deserialize, Serialize};

/// Top-level config file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub reconnect: ReconnectConfig,
    pub session: SessionConfig,
    pub display: DisplayConfig,
}

/// Which device to monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Substring of the HID device path (e.g. `vid_1038&pid_12b3&mi_03&col02`)
    pub pattern: String,
    /// Keep searching instead of exiting when the device is absent at startup
    pub wait_for_device: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            pattern: device::DEFAULT_PATTERN.to_string(),
            wait_for_device: false,
        }
    }
}

/// Retry timing while the device is missing or cannot be opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
        }
    }
}

/// Per-session limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound on the read half of each exchange
    pub read_timeout_ms: u64,
    /// Consecutive malformed frames tolerated before the session is reopened
    pub max_decode_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: timing::DEFAULT_READ_TIMEOUT_MS,
            max_decode_failures: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the raw frame and hex tokens along with the readout
    pub diagnostic: bool,
}

impl MonitorConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arctis-monitor")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Check value ranges the monitor relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.device.pattern.trim().is_empty(),
            "device.pattern must not be empty"
        );
        ensure!(
            self.reconnect.initial_backoff_ms > 0,
            "reconnect.initial_backoff_ms must be positive"
        );
        ensure!(
            self.reconnect.max_backoff_ms >= self.reconnect.initial_backoff_ms,
            "reconnect.max_backoff_ms must be at least reconnect.initial_backoff_ms"
        );
        ensure!(
            self.session.read_timeout_ms > 0,
            "session.read_timeout_ms must be positive"
        );
        ensure!(
            self.session.max_decode_failures > 0,
            "session.max_decode_failures must be positive"
        );
        Ok(())
    }
}
