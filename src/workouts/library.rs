//! Built-in workout library.
//!
//! Every template is derived from a [`TrainingConfig`]; rebuilding after an
//! FTP or zone change yields a new template and never mutates an old one.

use super::types::{
    TrainingConfig, WorkoutInfo, WorkoutPhase, WorkoutSegment, WorkoutTemplate, WorkoutType,
};

/// Warmup and cooldown length.
const RAMP_SECONDS: u32 = 5 * 60;

/// Library metadata for a workout type.
pub fn workout_info(workout_type: WorkoutType) -> WorkoutInfo {
    match workout_type {
        WorkoutType::Zone2 => WorkoutInfo {
            id: "zone2",
            name: "Zone 2 (HR Targeted)",
            description: "HR-targeted endurance - power auto-adjusts to keep HR in zone",
            frequency_hint: "Power auto-adjusts to maintain target HR",
            duration_minutes: 60,
            intensity: "Low",
        },
        WorkoutType::Vo2max => WorkoutInfo {
            id: "vo2max",
            name: "VO2max Intervals",
            description: "5x3min hard intervals - builds aerobic capacity",
            frequency_hint: "1x per week - best if only doing 1 cycling session",
            duration_minutes: 35,
            intensity: "High",
        },
        WorkoutType::SweetSpot => WorkoutInfo {
            id: "sweet_spot",
            name: "Sweet Spot",
            description: "2x20min @ 88-93% FTP - efficient endurance builder",
            frequency_hint: "1x per week alongside Zone 2 sessions",
            duration_minutes: 55,
            intensity: "Medium-High",
        },
        WorkoutType::Tempo => WorkoutInfo {
            id: "tempo",
            name: "Tempo/Threshold",
            description: "2x15min @ 95-100% FTP - lactate tolerance",
            frequency_hint: "1x per week alongside Zone 2 sessions",
            duration_minutes: 45,
            intensity: "High",
        },
    }
}

/// Metadata for every workout type.
pub fn workout_library() -> Vec<WorkoutInfo> {
    WorkoutType::ALL.into_iter().map(workout_info).collect()
}

/// Build the template for `workout_type` from `config`.
pub fn build_template(workout_type: WorkoutType, config: &TrainingConfig) -> WorkoutTemplate {
    let segments = match workout_type {
        WorkoutType::Zone2 => zone2_segments(config),
        WorkoutType::Vo2max => vo2max_segments(config),
        WorkoutType::SweetSpot => two_block_segments(config, "Sweet Spot", 20 * 60, 0.90),
        WorkoutType::Tempo => two_block_segments(config, "Tempo", 15 * 60, 0.97),
    };

    tracing::debug!(
        "Built {} template: {} segments, FTP {}W",
        workout_type,
        segments.len(),
        config.ftp
    );

    WorkoutTemplate {
        workout_type,
        segments,
        config: *config,
        power_band: config.power_band(),
        adaptive_start_power: config.zone2_power(),
    }
}

fn warmup(config: &TrainingConfig) -> WorkoutSegment {
    WorkoutSegment::new(
        "Warmup",
        RAMP_SECONDS,
        config.warmup_start_power(),
        config.zone2_power(),
        WorkoutPhase::Warmup,
    )
}

fn cooldown(config: &TrainingConfig, from_power: u16) -> WorkoutSegment {
    WorkoutSegment::new(
        "Cooldown",
        RAMP_SECONDS,
        from_power,
        config.cooldown_end_power(),
        WorkoutPhase::Cooldown,
    )
}

/// 5min warmup, 50min steady zone 2, 5min cooldown.
fn zone2_segments(config: &TrainingConfig) -> Vec<WorkoutSegment> {
    let zone2 = config.zone2_power();
    vec![
        warmup(config),
        WorkoutSegment::steady("Zone 2", 50 * 60, zone2, WorkoutPhase::Main),
        cooldown(config, zone2),
    ]
}

/// 5min warmup, 5x3min @ 120% with 3min recoveries between, 5min cooldown.
fn vo2max_segments(config: &TrainingConfig) -> Vec<WorkoutSegment> {
    let interval_power = config.percent_of_ftp(1.20);
    let recovery_power = config.percent_of_ftp(0.50);
    let mut segments = vec![warmup(config)];

    for i in 1..=5 {
        segments.push(WorkoutSegment::steady(
            format!("Interval {}", i),
            3 * 60,
            interval_power,
            WorkoutPhase::Interval,
        ));
        if i < 5 {
            segments.push(WorkoutSegment::steady(
                format!("Recovery {}", i),
                3 * 60,
                recovery_power,
                WorkoutPhase::Recovery,
            ));
        }
    }

    segments.push(cooldown(config, recovery_power));
    segments
}

/// Warmup, two main blocks split by a 5min recovery, cooldown.
fn two_block_segments(
    config: &TrainingConfig,
    label: &str,
    block_seconds: u32,
    fraction: f64,
) -> Vec<WorkoutSegment> {
    let block_power = config.percent_of_ftp(fraction);
    let recovery_power = config.percent_of_ftp(0.55);

    vec![
        warmup(config),
        WorkoutSegment::steady(
            format!("{} 1", label),
            block_seconds,
            block_power,
            WorkoutPhase::Main,
        ),
        WorkoutSegment::steady("Recovery", 5 * 60, recovery_power, WorkoutPhase::Recovery),
        WorkoutSegment::steady(
            format!("{} 2", label),
            block_seconds,
            block_power,
            WorkoutPhase::Main,
        ),
        cooldown(config, recovery_power),
    ]
}
