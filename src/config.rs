//! Persistent application configuration
//!
//! Stores acquisition parameters, alerting thresholds, and the channel
//! watch-set in a JSON file at `<data_dir>/vitalmon/config.json`.
//!
//! `AppConfig` is a plain value: edits produce a new value, and the
//! coordinator compares values structurally to decide whether the running
//! engine has to be replaced. Re-applying an identical config is a no-op.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn default_hist_size_api() -> u32 {
    500
}

fn default_hist_size_analytics() -> u32 {
    500
}

fn default_max_initial_rtt_ms() -> u32 {
    100
}

fn default_sync_interval_sec() -> u32 {
    60
}

fn default_analysis_interval_points() -> u32 {
    60
}

fn default_quality_threshold() -> f64 {
    crate::DEFAULT_QUALITY_THRESHOLD
}

fn default_duration_threshold_secs() -> u64 {
    crate::DEFAULT_DURATION_THRESHOLD_SECS
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sample history depth exposed to the UI, per channel
    #[serde(default = "default_hist_size_api")]
    pub hist_size_api: u32,
    /// Sample history depth kept for signal analysis, per channel
    #[serde(default = "default_hist_size_analytics")]
    pub hist_size_analytics: u32,
    /// Maximum accepted round-trip time during initial clock sync (ms)
    #[serde(default = "default_max_initial_rtt_ms")]
    pub max_initial_rtt_ms: u32,
    /// Interval between periodic device clock syncs (seconds)
    #[serde(default = "default_sync_interval_sec")]
    pub sync_interval_sec: u32,
    /// Number of new samples between analysis runs
    #[serde(default = "default_analysis_interval_points")]
    pub analysis_interval_points: u32,
    /// Replace real BLE devices with synthetic ones
    #[serde(default)]
    pub enable_mock_devices: bool,
    /// Signal quality below this value counts as degraded, in [0, 1]
    #[serde(default = "default_quality_threshold")]
    pub notification_quality_threshold: f64,
    /// Continuous degradation time before an alert fires (seconds)
    #[serde(default = "default_duration_threshold_secs")]
    pub notification_duration_threshold_secs: u64,
    /// Channel ids selected for degradation alerting
    #[serde(default)]
    pub watched_channels: BTreeSet<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hist_size_api: default_hist_size_api(),
            hist_size_analytics: default_hist_size_analytics(),
            max_initial_rtt_ms: default_max_initial_rtt_ms(),
            sync_interval_sec: default_sync_interval_sec(),
            analysis_interval_points: default_analysis_interval_points(),
            enable_mock_devices: false,
            notification_quality_threshold: default_quality_threshold(),
            notification_duration_threshold_secs: default_duration_threshold_secs(),
            watched_channels: BTreeSet::new(),
        }
    }
}

impl AppConfig {
    /// Config file path: `<data_dir>/vitalmon/config.json`
    pub fn path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalmon")
            .join("config.json")
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load() -> Self {
        let path = Self::path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
