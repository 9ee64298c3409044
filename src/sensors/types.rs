//! Sensor types and enums for the trainer and heart-rate links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest telemetry from the smart trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BikeSample {
    /// Instantaneous power in watts (negative readings clamp to 0)
    pub power_watts: u16,
    /// Instantaneous cadence in RPM
    pub cadence_rpm: u16,
    /// Instantaneous speed in km/h
    pub speed_kmh: f32,
    /// When the notification was received
    pub timestamp: DateTime<Utc>,
}

impl Default for BikeSample {
    fn default() -> Self {
        Self {
            power_watts: 0,
            cadence_rpm: 0,
            speed_kmh: 0.0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl BikeSample {
    /// Speed converted to meters per second.
    pub fn speed_mps(&self) -> f32 {
        self.speed_kmh / 3.6
    }
}

/// Latest reading from the heart-rate monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrSample {
    /// Heart rate in BPM
    pub heart_rate_bpm: u16,
    /// When the notification was received
    pub timestamp: DateTime<Utc>,
}

impl Default for HrSample {
    fn default() -> Self {
        Self {
            heart_rate_bpm: 0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Which remote device a link slot talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    /// Smart trainer (FTMS and/or Cycling Power)
    Trainer,
    /// Heart rate monitor
    HeartRateMonitor,
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceRole::Trainer => write!(f, "Trainer"),
            DeviceRole::HeartRateMonitor => write!(f, "HR Monitor"),
        }
    }
}

/// Connection state of a link slot.
///
/// `ControlAcquired` is only reached by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Connected and notifications subscribed
    Subscribed,
    /// Trainer control point is ours
    ControlAcquired,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Connecting => write!(f, "Connecting..."),
            LinkState::Subscribed => write!(f, "Subscribed"),
            LinkState::ControlAcquired => write!(f, "Control Acquired"),
        }
    }
}

/// Trainer classification derived from an advertised name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerInfo {
    /// Matched brand keyword, or "UNKNOWN" for generic matches
    pub kind: String,
    /// Whether the device accepts ERG target power commands
    pub has_erg: bool,
}

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// BLE device address/identifier
    pub address: String,
    /// Advertised name (empty if none)
    pub name: String,
    /// Signal strength (RSSI)
    pub signal_strength: Option<i16>,
    /// Trainer classification, if the name looks like a trainer
    pub trainer: Option<TrainerInfo>,
    /// Whether the name looks like a heart-rate monitor
    pub is_hr_monitor: bool,
}

impl DiscoveredDevice {
    /// ERG capability, defaulting to true when the name was not classified.
    pub fn has_erg(&self) -> bool {
        self.trainer.as_ref().map(|t| t.has_erg).unwrap_or(true)
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Every device seen
    pub all_devices: Vec<DiscoveredDevice>,
    /// Devices classified as trainers or power meters
    pub trainers: Vec<DiscoveredDevice>,
    /// Devices that look like heart-rate monitors
    pub hr_monitors: Vec<DiscoveredDevice>,
    /// Trainer matched by the configured name filter
    pub selected_trainer: Option<DiscoveredDevice>,
    /// HR monitor matched by the configured name filter
    pub selected_hr_monitor: Option<DiscoveredDevice>,
}

/// Snapshot of both link slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Trainer link state
    pub trainer_state: LinkState,
    /// Name of the connected (or selected) trainer
    pub trainer_name: Option<String>,
    /// Whether the trainer accepts ERG commands
    pub trainer_has_erg: bool,
    /// HR monitor link state
    pub hr_state: LinkState,
    /// Whether an ERG target is currently held by the trainer
    pub erg_active: bool,
    /// Last target power written to the trainer
    pub target_power: Option<i16>,
}

impl DeviceStatus {
    /// True once the trainer has at least subscribed.
    pub fn trainer_connected(&self) -> bool {
        matches!(
            self.trainer_state,
            LinkState::Subscribed | LinkState::ControlAcquired
        )
    }

    /// True once the HR monitor has subscribed.
    pub fn hr_connected(&self) -> bool {
        self.hr_state == LinkState::Subscribed
    }
}

/// Events raised by the device link worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// Decoded bike telemetry (including cycling-power merges)
    Bike(BikeSample),
    /// Decoded heart rate
    HeartRate(HrSample),
    /// A link slot changed state
    StateChanged { role: DeviceRole, state: LinkState },
    /// Non-fatal error worth surfacing
    Error(String),
}

/// Configuration for the device link.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// Name substring (case-insensitive) that auto-selects the trainer
    pub trainer_filter: String,
    /// Name substring (case-insensitive) that auto-selects the HR monitor
    pub hr_filter: String,
    /// Duration of a discovery scan in seconds
    pub scan_timeout_secs: u64,
    /// Upper bound for any single connect or control point write, in seconds
    pub write_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trainer_filter: "KICKR".to_string(),
            hr_filter: "MYZONE".to_string(),
            scan_timeout_secs: 10,
            write_timeout_secs: 30,
        }
    }
}

/// Errors that can occur on the device link.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Failed to start BLE scanning
    #[error("Failed to start scanning: {0}")]
    ScanFailed(String),

    /// Device not found with given address
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// No address known for the role (scan first)
    #[error("No {0} selected; scan for devices first")]
    NoDeviceSelected(DeviceRole),

    /// Connection to device failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation did not finish in time
    #[error("Operation timed out")]
    Timeout,

    /// The role is not connected
    #[error("{0} not connected")]
    NotConnected(DeviceRole),

    /// Failed to subscribe to notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// Failed to write to the control point
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Device lacks the characteristic needed for the operation
    #[error("Unsupported sensor type or protocol")]
    Unsupported,

    /// The link worker is gone
    #[error("Device link closed")]
    LinkClosed,

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}
