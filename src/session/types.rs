//! Session commands, outbound events and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::metrics::alerts::{Alert, Severity};
use crate::metrics::analyzer::WorkoutStats;
use crate::recording::types::RecorderError;
use crate::sensors::types::{
    BikeSample, DeviceRole, DeviceStatus, DiscoveryResult, HrSample, LinkState, SensorError,
};
use crate::storage::config::ConfigError;
use crate::workouts::types::{WorkoutError, WorkoutPhase, WorkoutProgress, WorkoutSummary};

/// Commands accepted by the session coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Reset analysis and recording, then run the selected workout
    StartWorkout,
    /// Stop, leave ERG and save the ride
    StopWorkout,
    /// Select a workout by id (refused while running)
    SetWorkoutType(String),
    /// Change FTP and rebuild the template
    UpdateFtp(u16),
    /// Change the Zone 2 band
    UpdateHrZones { low: u16, high: u16 },
    /// Scan and auto-connect filter matches
    Scan,
    /// Connect a specific trainer, or the scan's selection
    ConnectTrainer {
        address: Option<String>,
        name: Option<String>,
    },
    DisconnectTrainer,
    /// Manual ERG target
    SetErgPower(i16),
    /// Leave ERG mode (free ride)
    StopErg,
    /// Replace device name filters
    SetDeviceFilter {
        trainer: Option<String>,
        heart_rate: Option<String>,
    },
    /// End the coordinator
    Shutdown,
}

/// Events published to the display/transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Bike telemetry, with the current target (0 when idle)
    Bike {
        sample: BikeSample,
        target_power: u16,
    },
    HeartRate(HrSample),
    PhaseChange { phase: WorkoutPhase, name: String },
    /// New ERG target commanded by the workout
    PowerChange(u16),
    Alert(Alert),
    Stats(WorkoutStats),
    WorkoutStatus(WorkoutProgress),
    /// Workout structure after a selection or config change
    WorkoutSummary(WorkoutSummary),
    LinkState { role: DeviceRole, state: LinkState },
    DeviceStatus(DeviceStatus),
    ScanResult(DiscoveryResult),
    WorkoutSaved(PathBuf),
    WorkoutComplete,
    /// Informational message not tied to an alert kind
    Notice { message: String, severity: Severity },
}

/// Errors from the session coordinator.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session coordinator is not running")]
    Closed,

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Workout error: {0}")]
    Workout(#[from] WorkoutError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
