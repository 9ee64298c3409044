//! Workout types and enums.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::zones::HeartRateZone;

/// Phase of a workout, driving power computation and alert gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutPhase {
    /// Workout not started
    #[default]
    NotStarted,
    /// Ramp up
    Warmup,
    /// Main steady block (HR-targeted under zone2)
    Main,
    /// Hard interval
    Interval,
    /// Easy spin between efforts
    Recovery,
    /// Ramp down
    Cooldown,
    /// All segments done
    Completed,
}

impl WorkoutPhase {
    /// Stable identifier used on the event stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutPhase::NotStarted => "not_started",
            WorkoutPhase::Warmup => "warmup",
            WorkoutPhase::Main => "main",
            WorkoutPhase::Interval => "interval",
            WorkoutPhase::Recovery => "recovery",
            WorkoutPhase::Cooldown => "cooldown",
            WorkoutPhase::Completed => "completed",
        }
    }
}

impl std::fmt::Display for WorkoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkoutPhase::NotStarted => write!(f, "Not Started"),
            WorkoutPhase::Warmup => write!(f, "Warmup"),
            WorkoutPhase::Main => write!(f, "Main"),
            WorkoutPhase::Interval => write!(f, "Interval"),
            WorkoutPhase::Recovery => write!(f, "Recovery"),
            WorkoutPhase::Cooldown => write!(f, "Cooldown"),
            WorkoutPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// Built-in workout types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    /// HR-targeted endurance ride
    #[default]
    Zone2,
    /// 5x3min hard intervals
    Vo2max,
    /// 2x20min at 90% FTP
    SweetSpot,
    /// 2x15min at 97% FTP
    Tempo,
}

impl WorkoutType {
    /// Every workout type, in library order.
    pub const ALL: [WorkoutType; 4] = [
        WorkoutType::Zone2,
        WorkoutType::Vo2max,
        WorkoutType::SweetSpot,
        WorkoutType::Tempo,
    ];

    /// Identifier accepted by [`FromStr`].
    pub fn id(&self) -> &'static str {
        match self {
            WorkoutType::Zone2 => "zone2",
            WorkoutType::Vo2max => "vo2max",
            WorkoutType::SweetSpot => "sweet_spot",
            WorkoutType::Tempo => "tempo",
        }
    }

    /// Whether Main segments of this type are driven by heart rate.
    pub fn is_hr_targeted(&self) -> bool {
        matches!(self, WorkoutType::Zone2)
    }
}

impl std::fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for WorkoutType {
    type Err = WorkoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkoutType::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| WorkoutError::UnknownWorkoutType(s.to_string()))
    }
}

/// Library metadata for a workout type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkoutInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub frequency_hint: &'static str,
    pub duration_minutes: u32,
    pub intensity: &'static str,
}

/// Athlete parameters every template is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Functional threshold power in watts
    pub ftp: u16,
    /// Zone 2 heart rate band
    pub hr_zone: HeartRateZone,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            ftp: 215,
            hr_zone: HeartRateZone::new(124, 143),
        }
    }
}

impl TrainingConfig {
    pub fn new(ftp: u16, hr_zone: HeartRateZone) -> Self {
        Self { ftp, hr_zone }
    }

    /// Watts at `fraction` of FTP, truncated toward zero.
    pub fn percent_of_ftp(&self, fraction: f64) -> u16 {
        (self.ftp as f64 * fraction) as u16
    }

    /// Starting power for HR-targeted mode (65% FTP).
    pub fn zone2_power(&self) -> u16 {
        self.percent_of_ftp(0.65)
    }

    /// Band adaptive power is clamped to (50-80% FTP).
    pub fn power_band(&self) -> PowerBand {
        PowerBand {
            low: self.percent_of_ftp(0.50),
            high: self.percent_of_ftp(0.80),
        }
    }

    /// Warmup start power (40% FTP).
    pub fn warmup_start_power(&self) -> u16 {
        self.percent_of_ftp(0.40)
    }

    /// Cooldown end power (40% FTP).
    pub fn cooldown_end_power(&self) -> u16 {
        self.percent_of_ftp(0.40)
    }

    /// Target heart rate, the midpoint of the zone.
    pub fn hr_target(&self) -> u16 {
        self.hr_zone.midpoint()
    }
}

/// Inclusive power range in watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerBand {
    pub low: u16,
    pub high: u16,
}

impl PowerBand {
    /// Clamp into the band. An inverted band resolves to `low`.
    pub fn clamp(&self, watts: i32) -> u16 {
        watts.min(self.high as i32).max(self.low as i32).max(0) as u16
    }
}

/// A timed block of a workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSegment {
    /// Display name
    pub name: String,
    /// Duration in seconds
    pub duration_seconds: u32,
    /// Power at the start of the segment
    pub start_power: u16,
    /// Power at the end of the segment
    pub end_power: u16,
    /// Phase this segment belongs to
    pub phase: WorkoutPhase,
}

impl WorkoutSegment {
    pub fn new(
        name: impl Into<String>,
        duration_seconds: u32,
        start_power: u16,
        end_power: u16,
        phase: WorkoutPhase,
    ) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            start_power,
            end_power,
            phase,
        }
    }

    /// Constant-power segment.
    pub fn steady(name: impl Into<String>, duration_seconds: u32, power: u16, phase: WorkoutPhase) -> Self {
        Self::new(name, duration_seconds, power, power, phase)
    }

    /// Target power `elapsed_seconds` into the segment.
    ///
    /// Linear from start to end, with elapsed time clamped to the duration.
    /// Fractional watts truncate toward zero.
    pub fn power_at(&self, elapsed_seconds: u32) -> u16 {
        if self.start_power == self.end_power || self.duration_seconds == 0 {
            return if elapsed_seconds == 0 {
                self.start_power
            } else {
                self.end_power
            };
        }

        let progress = (elapsed_seconds as f64 / self.duration_seconds as f64).min(1.0);
        let start = self.start_power as f64;
        let end = self.end_power as f64;
        (start + (end - start) * progress) as u16
    }
}

/// An immutable workout built from a [`TrainingConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    /// Which library workout this is
    pub workout_type: WorkoutType,
    /// Ordered segments
    pub segments: Vec<WorkoutSegment>,
    /// Parameters the template was built from
    pub config: TrainingConfig,
    /// Clamp band for adaptive power
    pub power_band: PowerBand,
    /// Adaptive power when HR control (re-)arms
    pub adaptive_start_power: u16,
}

impl WorkoutTemplate {
    /// Sum of all segment durations.
    pub fn total_duration_seconds(&self) -> u32 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }

    /// Whether entering `segment` arms HR-driven power.
    pub fn is_adaptive_segment(&self, segment: &WorkoutSegment) -> bool {
        self.workout_type.is_hr_targeted() && segment.phase == WorkoutPhase::Main
    }
}

/// Current status of workout execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    /// Workout not started
    #[default]
    NotStarted,
    /// Workout in progress
    InProgress,
    /// Workout completed successfully
    Completed,
    /// Workout stopped early
    Stopped,
}

/// Events emitted by the workout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkoutEvent {
    /// A segment became active (always precedes its first power change)
    PhaseChanged { phase: WorkoutPhase, name: String },
    /// New target power to send to the trainer
    PowerChanged(u16),
    /// Every segment has run
    Completed,
}

/// Progress snapshot for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutProgress {
    pub status: WorkoutStatus,
    pub phase: WorkoutPhase,
    pub segment_name: String,
    /// -1 when not running
    pub segment_index: i32,
    pub target_power: u16,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub segment_remaining_seconds: f64,
    pub total_duration_seconds: u32,
    pub hr_target_mode: bool,
}

/// One segment in a [`WorkoutSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub name: String,
    pub duration_minutes: u32,
    pub power_start: u16,
    pub power_end: u16,
    pub phase: WorkoutPhase,
}

/// Structure of the selected workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkoutSummary {
    pub workout_type: WorkoutType,
    pub ftp: u16,
    pub zone2_power: u16,
    pub power_band: PowerBand,
    pub total_duration_minutes: u32,
    pub hr_target: u16,
    pub hr_zone: HeartRateZone,
    pub hr_target_mode: bool,
    pub segments: Vec<SegmentSummary>,
}

/// Errors from workout selection and execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkoutError {
    #[error("Unknown workout type: {0}")]
    UnknownWorkoutType(String),

    #[error("Workout has no segments")]
    EmptyWorkout,

    #[error("Workout already running")]
    AlreadyRunning,
}
