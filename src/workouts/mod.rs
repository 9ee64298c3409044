//! Workout module for structured and HR-targeted training sessions.

pub mod adaptive;
pub mod engine;
pub mod library;
pub mod types;

pub use engine::WorkoutEngine;
pub use library::{build_template, workout_info, workout_library};
pub use types::{
    PowerBand, TrainingConfig, WorkoutError, WorkoutEvent, WorkoutInfo, WorkoutPhase,
    WorkoutProgress, WorkoutSegment, WorkoutStatus, WorkoutSummary, WorkoutTemplate, WorkoutType,
};
