// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::db::HistoryConfig;
use crate::inference::InferenceConfig;
use crate::notify::NotifyConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory relative document paths resolve under
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Alert latch and cooldown
    pub detection: DetectionConfig,

    /// Pose model collaborator
    pub inference: InferenceConfig,

    /// Notification channels
    pub notify: NotifyConfig,

    /// Event history
    pub history: HistoryConfig,

    /// Continuous frame stream
    pub stream: StreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            detection: DetectionConfig::default(),
            inference: InferenceConfig::default(),
            notify: NotifyConfig::default(),
            history: HistoryConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Move the settings and history documents under `data_dir`
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    /// Settings document path. Absolute paths are used as-is.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.notify.settings_path)
    }

    /// History configuration with its document path resolved
    pub fn history(&self) -> HistoryConfig {
        HistoryConfig {
            path: self.data_dir.join(&self.history.path),
            ..self.history.clone()
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("fallwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

pub const SETTINGS_FILE: &str = "settings.json";
pub const HISTORY_FILE: &str = "events.json";

/// Alert latch and cooldown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// How long one fall keeps the alert active
    pub latch_window_secs: f64,

    /// Minimum interval between notification bursts
    pub cooldown_secs: f64,

    /// Location written into event records
    pub room_label: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            latch_window_secs: 5.0,
            cooldown_secs: 3.0,
            room_label: "Living Room".to_string(),
        }
    }
}

/// Upper bound for configured intervals, so deadlines stay representable
pub const LONGEST_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Seconds to a `Duration`. Negative and NaN give zero, large values
/// saturate at [`LONGEST_INTERVAL`].
fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value)
        .unwrap_or(LONGEST_INTERVAL)
        .min(LONGEST_INTERVAL)
}

impl DetectionConfig {
    pub fn latch_window(&self) -> Duration {
        secs(self.latch_window_secs)
    }

    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }
}

/// Continuous stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Run the stream worker
    pub enabled: bool,

    /// Directory of still images replayed as the stream
    pub frames_dir: Option<PathBuf>,

    /// Frames per second
    pub fps: f64,

    /// Wait before retrying an unavailable source
    pub retry_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frames_dir: None,
            fps: 10.0,
            retry_delay_ms: 1000,
        }
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        if self.fps > 0.0 {
            secs(1.0 / self.fps)
        } else {
            Duration::from_secs(1)
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
