//! Configuration for tamper-guard.
//!
//! Heuristic thresholds live here rather than in the detectors because they
//! are environment-dependent (high-DPI displays, split screens, slow frames)
//! and operators need to tune them.

use crate::core::policy::{PartialPolicy, SecurityLevel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Level used when none is given on the command line
    #[serde(default)]
    pub level: SecurityLevel,

    /// Overrides merged on top of the level's preset
    #[serde(default)]
    pub overrides: PartialPolicy,

    /// Detector tuning
    #[serde(default)]
    pub thresholds: DetectorThresholds,

    /// Session watermark settings
    #[serde(default)]
    pub watermark: WatermarkConfig,

    /// Route allow-list guard settings
    #[serde(default)]
    pub routes: RouteGuardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Medium,
            overrides: PartialPolicy::default(),
            thresholds: DetectorThresholds::default(),
            watermark: WatermarkConfig::default(),
            routes: RouteGuardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tamper-guard")
            .join("config.json")
    }
}

/// Tunable constants for every heuristic detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Outer-minus-inner window size (px) above which devtools are assumed docked
    pub devtools_size_px: u32,
    /// Minimum spacing between devtools polls
    #[serde(with = "millis_serde")]
    pub devtools_poll_interval: Duration,
    /// Inter-frame delay window that suggests a capture-induced stall
    #[serde(with = "millis_serde")]
    pub freeze_min: Duration,
    #[serde(with = "millis_serde")]
    pub freeze_max: Duration,
    /// How recently a freeze must have happened to classify a screenshot as AI-assisted
    #[serde(with = "millis_serde")]
    pub capture_window: Duration,
    /// Key-down intervals below this count as automated
    #[serde(with = "millis_serde")]
    pub keystroke_interval: Duration,
    /// Number of automated intervals before the timing detector fires
    pub keystroke_run: u32,
    /// Distinct concurrently held keys that count as ghosting
    pub ghosting_keys: usize,
    /// outer/inner width ratio that suggests zoomed devtools
    pub zoom_ratio: f64,
    /// Touch hold duration treated as an inspect long-press
    #[serde(with = "millis_serde")]
    pub long_press: Duration,
    /// Upper bound on a single network probe
    #[serde(with = "millis_serde")]
    pub network_timeout: Duration,
    /// Organisation substrings that mark an address as datacenter-hosted
    pub datacenter_orgs: Vec<String>,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            devtools_size_px: 160,
            devtools_poll_interval: Duration::from_millis(1000),
            freeze_min: Duration::from_millis(250),
            freeze_max: Duration::from_millis(650),
            capture_window: Duration::from_millis(1000),
            keystroke_interval: Duration::from_millis(20),
            keystroke_run: 15,
            ghosting_keys: 4,
            zoom_ratio: 1.05,
            long_press: Duration::from_millis(500),
            network_timeout: Duration::from_secs(5),
            datacenter_orgs: ["amazonaws", "google", "digitalocean", "ovh"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Session watermark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Prefix placed before the session timestamp
    pub prefix: String,
    /// Text opacity, 0.05 to 0.25 recommended
    pub opacity: f64,
    /// Font size in px
    pub font_size: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            prefix: "SECURE • BONHOMIE • ".to_string(),
            opacity: 0.12,
            font_size: 22,
        }
    }
}

/// Route allow-list guard settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteGuardConfig {
    /// Allowed paths; empty allows everything
    pub allowed_routes: Vec<String>,
    /// Fallback path for blocked routes
    pub redirect_to: Option<String>,
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.level, SecurityLevel::Medium);
        assert_eq!(config.thresholds.devtools_size_px, 160);
        assert_eq!(config.thresholds.keystroke_run, 15);
        assert_eq!(config.thresholds.ghosting_keys, 4);
        assert!(config.routes.allowed_routes.is_empty());
    }

    #[test]
    fn test_thresholds_serialize_as_millis() {
        let json = serde_json::to_value(DetectorThresholds::default()).unwrap();
        assert_eq!(json["freeze_min"], 250);
        assert_eq!(json["freeze_max"], 650);
        assert_eq!(json["network_timeout"], 5000);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"level": "high", "thresholds": {"devtools_size_px": 200}}"#,
        )
        .unwrap();
        assert_eq!(config.level, SecurityLevel::High);
        assert_eq!(config.thresholds.devtools_size_px, 200);
        assert_eq!(config.thresholds.long_press, Duration::from_millis(500));
        assert_eq!(config.watermark.font_size, 22);
    }
}
