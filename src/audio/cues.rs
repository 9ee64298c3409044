//! Spoken cue text.
//!
//! Alerts are shortened for speech; phase changes get a one-line announcement.

use crate::metrics::alerts::{AlertKind, Severity};
use crate::workouts::types::{WorkoutPhase, WorkoutSegment};

pub const WORKOUT_STOPPED: &str = "Workout stopped. Saving file.";
pub const WORKOUT_COMPLETE: &str = "Workout complete! Great job. Saving your ride.";
pub const WORKOUT_SAVED: &str = "Workout saved.";

/// Short spoken form of an alert.
pub fn spoken_alert(kind: AlertKind, severity: Severity) -> String {
    let prefix = match severity {
        Severity::Warning => "Warning: ",
        Severity::Critical => "Alert: ",
    };
    let message = match kind {
        AlertKind::HrHigh => "Heart rate too high. Ease up.",
        AlertKind::HrLow => "Heart rate too low. Push harder.",
        AlertKind::CardiacDrift => "Cardiac drift detected. You may be fatiguing.",
        AlertKind::Decoupling => "Power and heart rate decoupling. Consider wrapping up.",
    };
    format!("{}{}", prefix, message)
}

/// Announcement for entering `phase`.
///
/// `segment` is the segment just entered, absent on completion.
pub fn phase_announcement(phase: WorkoutPhase, segment: Option<&WorkoutSegment>) -> String {
    match (phase, segment) {
        (WorkoutPhase::Warmup, Some(s)) => {
            format!("Starting warmup. Ramping to {} watts.", s.end_power)
        }
        (WorkoutPhase::Main, Some(s)) => format!(
            "Main set: {} watts for {} minutes.",
            s.start_power,
            s.duration_seconds / 60
        ),
        (WorkoutPhase::Interval, Some(s)) => format!("{}. {} watts. Go!", s.name, s.start_power),
        (WorkoutPhase::Recovery, Some(s)) => format!("{}. Easy spin.", s.name),
        (WorkoutPhase::Cooldown, _) => "Starting cooldown. Ramping down.".to_string(),
        (WorkoutPhase::Completed, _) => "Workout complete!".to_string(),
        (_, Some(s)) => s.name.clone(),
        (_, None) => phase.to_string(),
    }
}
