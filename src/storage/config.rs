//! Application configuration.
//!
//! Stored as TOML in the platform data directory. Missing files and missing
//! sections fall back to defaults; values are taken as given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::analyzer::AnalyzerConfig;
use crate::metrics::zones::HeartRateZone;
use crate::recording::types::RecorderConfig;
use crate::sensors::types::SensorConfig;
use crate::workouts::types::{TrainingConfig, WorkoutType};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Athlete settings
    pub user: UserSettings,
    /// Zone analyzer thresholds
    pub analyzer: AnalyzerSettings,
    /// Alert delivery
    pub alerts: AlertSettings,
    /// Device selection and timeouts
    pub devices: DeviceSettings,
    /// Recording output
    pub recording: RecordingSettings,
    /// Selected workout
    pub workout: WorkoutSettings,
}

impl AppConfig {
    /// Zone 2 band from the user settings.
    pub fn hr_zone(&self) -> HeartRateZone {
        HeartRateZone::new(self.user.zone2_hr_low, self.user.zone2_hr_high)
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new(self.user.ftp, self.hr_zone())
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            zone: self.hr_zone(),
            drift_threshold_percent: self.analyzer.drift_threshold_percent,
            decoupling_threshold_percent: self.analyzer.decoupling_threshold_percent,
            hr_alert_delay: Duration::from_secs(self.analyzer.hr_alert_delay_secs),
            alert_cooldown: Duration::from_secs(self.analyzer.alert_cooldown_secs),
            ..AnalyzerConfig::default()
        }
    }

    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            trainer_filter: self.devices.trainer_name.clone(),
            hr_filter: self.devices.hr_monitor_name.clone(),
            scan_timeout_secs: self.devices.scan_timeout_secs,
            write_timeout_secs: self.devices.write_timeout_secs,
        }
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            backup_dir: self.recording.backup_dir.clone(),
            snapshot_every_records: self.recording.snapshot_every_records,
        }
    }

    /// Selected workout type, falling back to zone 2 for unknown ids.
    pub fn workout_type(&self) -> WorkoutType {
        self.workout.workout_type.parse().unwrap_or_else(|e| {
            tracing::warn!("{}, using zone2", e);
            WorkoutType::Zone2
        })
    }
}

/// Athlete settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Functional threshold power in watts
    pub ftp: u16,
    /// Maximum heart rate in BPM
    pub max_hr: u16,
    /// Zone 2 lower bound in BPM
    pub zone2_hr_low: u16,
    /// Zone 2 upper bound in BPM
    pub zone2_hr_high: u16,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            ftp: 215,
            max_hr: 190,
            zone2_hr_low: 124,
            zone2_hr_high: 143,
        }
    }
}

/// Zone analyzer thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub drift_threshold_percent: f64,
    pub decoupling_threshold_percent: f64,
    pub hr_alert_delay_secs: u64,
    pub alert_cooldown_secs: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            drift_threshold_percent: 5.0,
            decoupling_threshold_percent: 10.0,
            hr_alert_delay_secs: 10,
            alert_cooldown_secs: 30,
        }
    }
}

/// Alert delivery switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Speak alerts and play cues
    pub audio_enabled: bool,
    /// Forward alerts to the display
    pub visual_enabled: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            visual_enabled: true,
        }
    }
}

/// Device selection and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Name filter for the trainer
    pub trainer_name: String,
    /// Name filter for the HR monitor
    pub hr_monitor_name: String,
    /// Scan duration in seconds
    pub scan_timeout_secs: u64,
    /// Control write timeout in seconds
    pub write_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            trainer_name: "KICKR".to_string(),
            hr_monitor_name: "MYZONE".to_string(),
            scan_timeout_secs: 10,
            write_timeout_secs: 30,
        }
    }
}

/// Recording output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Where exported FIT files go
    pub output_dir: PathBuf,
    /// Where crash-safe snapshots go
    pub backup_dir: PathBuf,
    /// Records between snapshots
    pub snapshot_every_records: usize,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("workouts"),
            backup_dir: PathBuf::from("workouts"),
            snapshot_every_records: 30,
        }
    }
}

/// Selected workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutSettings {
    /// Workout type id
    pub workout_type: String,
}

impl Default for WorkoutSettings {
    fn default() -> Self {
        Self {
            workout_type: WorkoutType::Zone2.id().to_string(),
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "zoneride", "ZoneRide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`, or defaults when it does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    tracing::debug!("Saved config to {}", path.display());
    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
