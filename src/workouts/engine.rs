//! Workout execution engine.
//!
//! Sequences template segments by elapsed wall-clock time, computes the target
//! power (interpolated, or HR-driven on adaptive segments) and reports phase
//! and power changes on an event channel. Time is always passed in by the
//! caller so the engine never reads a clock itself.

use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};

use crate::metrics::zones::HeartRateZone;
use crate::workouts::adaptive::AdaptiveControlState;
use crate::workouts::library::build_template;
use crate::workouts::types::{
    SegmentSummary, TrainingConfig, WorkoutError, WorkoutEvent, WorkoutPhase, WorkoutProgress,
    WorkoutSegment, WorkoutStatus, WorkoutSummary, WorkoutTemplate, WorkoutType,
};

/// Workout execution engine.
pub struct WorkoutEngine {
    /// Active template (replaced wholesale on config changes)
    template: WorkoutTemplate,
    /// Execution status
    status: WorkoutStatus,
    /// Index of the active segment while running
    current_segment: Option<usize>,
    /// When the workout started
    workout_start: Option<Instant>,
    /// When the active segment started
    segment_start: Option<Instant>,
    /// Last power reported downstream
    last_target_power: u16,
    /// HR-driven power state
    adaptive: AdaptiveControlState,
    /// Channel for engine events
    event_tx: Option<Sender<WorkoutEvent>>,
}

impl WorkoutEngine {
    /// Create an engine with `workout_type` built from `config`.
    pub fn new(workout_type: WorkoutType, config: TrainingConfig) -> Self {
        Self {
            template: build_template(workout_type, &config),
            status: WorkoutStatus::NotStarted,
            current_segment: None,
            workout_start: None,
            segment_start: None,
            last_target_power: 0,
            adaptive: AdaptiveControlState::default(),
            event_tx: None,
        }
    }

    /// Zone 2 workout with default FTP and zone.
    pub fn with_defaults() -> Self {
        Self::new(WorkoutType::Zone2, TrainingConfig::default())
    }

    /// Get an event receiver for engine events.
    pub fn event_receiver(&mut self) -> Receiver<WorkoutEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.event_tx = Some(tx);
        rx
    }

    fn send_event(&self, event: WorkoutEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Start from segment 0.
    ///
    /// Emits the phase change for segment 0 and then its t=0 power.
    pub fn start(&mut self, now: Instant) -> Result<u16, WorkoutError> {
        if self.is_running() {
            return Err(WorkoutError::AlreadyRunning);
        }
        if self.template.segments.is_empty() {
            return Err(WorkoutError::EmptyWorkout);
        }

        self.status = WorkoutStatus::InProgress;
        self.workout_start = Some(now);
        self.adaptive.reset(self.template.adaptive_start_power, now);

        tracing::info!("Workout started: {}", self.template.workout_type);
        self.enter_segment(0, now);

        let initial_power = self.segment_power(0, 0);
        self.last_target_power = initial_power;
        self.send_event(WorkoutEvent::PowerChanged(initial_power));

        Ok(initial_power)
    }

    /// Stop the workout. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.status == WorkoutStatus::InProgress {
            self.status = WorkoutStatus::Stopped;
            tracing::info!("Workout stopped");
        }
        self.current_segment = None;
        self.adaptive.disarm();
    }

    /// Advance the state machine. Call about once per second.
    ///
    /// Returns the new target power when it changed since the last report.
    pub fn tick(&mut self, now: Instant) -> Option<u16> {
        if self.status != WorkoutStatus::InProgress {
            return None;
        }
        let mut index = self.current_segment?;
        let mut segment_start = self.segment_start.unwrap_or(now);

        let duration = self.template.segments[index].duration_seconds as f64;
        if now.saturating_duration_since(segment_start).as_secs_f64() >= duration {
            index += 1;
            if index >= self.template.segments.len() {
                self.complete();
                return None;
            }
            segment_start = now;
            self.enter_segment(index, now);
        }

        let target_power = if self.adaptive.is_enabled() {
            self.adaptive.current_power()
        } else {
            let elapsed = now.saturating_duration_since(segment_start).as_secs() as u32;
            self.segment_power(index, elapsed)
        };

        self.report_power(target_power)
    }

    /// Feed a heart rate sample to the adaptive window (only while armed).
    pub fn record_heart_rate(&mut self, heart_rate: u16) {
        self.adaptive.record(heart_rate);
    }

    /// Re-target power from recent heart rate.
    ///
    /// Returns the new power when the adaptive value changed.
    pub fn adjust_adaptive_power(&mut self, now: Instant) -> Option<u16> {
        let zone = self.template.config.hr_zone;
        let band = self.template.power_band;
        let new_power = self.adaptive.adjust(now, &zone, &band)?;
        self.report_power(new_power)
    }

    /// Switch workout type, rebuilding the template.
    ///
    /// Refused while a workout is running.
    pub fn set_workout_type(&mut self, workout_type: WorkoutType) -> Result<(), WorkoutError> {
        if self.is_running() {
            return Err(WorkoutError::AlreadyRunning);
        }
        self.template = build_template(workout_type, &self.template.config);
        tracing::info!("Workout type set to {}", workout_type);
        Ok(())
    }

    /// Update FTP, rebuilding the template for the same workout type.
    pub fn set_ftp(&mut self, ftp: u16) {
        let config = TrainingConfig {
            ftp,
            ..self.template.config
        };
        self.apply_config(config);
    }

    /// Update the HR zone, rebuilding the template for the same workout type.
    pub fn set_hr_zone(&mut self, zone: HeartRateZone) {
        let config = TrainingConfig {
            hr_zone: zone,
            ..self.template.config
        };
        self.apply_config(config);
    }

    /// Replace the training config, rebuilding the template.
    ///
    /// Armed adaptive power is clamped into the new band; the next tick
    /// reports it.
    pub fn apply_config(&mut self, config: TrainingConfig) {
        self.template = build_template(self.template.workout_type, &config);
        tracing::info!(
            "Training config: FTP {}W, HR zone {}-{}",
            config.ftp,
            config.hr_zone.low,
            config.hr_zone.high
        );

        if self.adaptive.is_enabled() {
            if let Some(power) = self.adaptive.clamp_to(&self.template.power_band) {
                tracing::info!("Adaptive power clamped to {}W", power);
            }
        }
    }

    fn enter_segment(&mut self, index: usize, now: Instant) {
        self.current_segment = Some(index);
        self.segment_start = Some(now);

        let segment = &self.template.segments[index];
        let phase = segment.phase;
        let name = segment.name.clone();

        if self.template.is_adaptive_segment(segment) {
            self.adaptive.arm(self.template.adaptive_start_power, now);
        } else {
            self.adaptive.disarm();
        }

        tracing::info!("Segment {}: {} ({})", index, name, phase);
        self.send_event(WorkoutEvent::PhaseChanged { phase, name });
    }

    fn complete(&mut self) {
        self.status = WorkoutStatus::Completed;
        self.current_segment = None;
        self.adaptive.disarm();
        tracing::info!("Workout completed");
        self.send_event(WorkoutEvent::PhaseChanged {
            phase: WorkoutPhase::Completed,
            name: "Complete".to_string(),
        });
        self.send_event(WorkoutEvent::Completed);
    }

    fn segment_power(&self, index: usize, elapsed_seconds: u32) -> u16 {
        self.template.segments[index].power_at(elapsed_seconds)
    }

    fn report_power(&mut self, power: u16) -> Option<u16> {
        if power == self.last_target_power {
            return None;
        }
        self.last_target_power = power;
        self.send_event(WorkoutEvent::PowerChanged(power));
        Some(power)
    }

    /// The active template.
    pub fn template(&self) -> &WorkoutTemplate {
        &self.template
    }

    pub fn workout_type(&self) -> WorkoutType {
        self.template.workout_type
    }

    pub fn config(&self) -> TrainingConfig {
        self.template.config
    }

    pub fn status(&self) -> WorkoutStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkoutStatus::InProgress
    }

    /// Whether HR-driven power is currently armed.
    pub fn is_hr_target_mode(&self) -> bool {
        self.adaptive.is_enabled()
    }

    /// Active segment index, or -1 when not running.
    pub fn current_segment_index(&self) -> i32 {
        self.current_segment.map(|i| i as i32).unwrap_or(-1)
    }

    /// The active segment, if running.
    pub fn current_segment(&self) -> Option<&WorkoutSegment> {
        self.current_segment.map(|i| &self.template.segments[i])
    }

    pub fn current_phase(&self) -> WorkoutPhase {
        match (self.status, self.current_segment()) {
            (WorkoutStatus::Completed, _) => WorkoutPhase::Completed,
            (_, Some(segment)) => segment.phase,
            _ => WorkoutPhase::NotStarted,
        }
    }

    /// Last power reported downstream.
    pub fn target_power(&self) -> u16 {
        self.last_target_power
    }

    pub fn total_duration_seconds(&self) -> u32 {
        self.template.total_duration_seconds()
    }

    /// Progress snapshot at `now`.
    pub fn progress(&self, now: Instant) -> WorkoutProgress {
        let since = |start: Option<Instant>| {
            start
                .map(|s| now.saturating_duration_since(s).as_secs_f64())
                .unwrap_or(0.0)
        };
        let elapsed = since(self.workout_start);
        let total = self.total_duration_seconds();
        let segment_remaining = self
            .current_segment()
            .map(|s| (s.duration_seconds as f64 - since(self.segment_start)).max(0.0))
            .unwrap_or(0.0);

        WorkoutProgress {
            status: self.status,
            phase: self.current_phase(),
            segment_name: self
                .current_segment()
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            segment_index: self.current_segment_index(),
            target_power: self.last_target_power,
            elapsed_seconds: elapsed,
            remaining_seconds: (total as f64 - elapsed).max(0.0),
            segment_remaining_seconds: segment_remaining,
            total_duration_seconds: total,
            hr_target_mode: self.adaptive.is_enabled(),
        }
    }

    /// Structure of the selected workout.
    pub fn summary(&self) -> WorkoutSummary {
        let config = self.template.config;
        WorkoutSummary {
            workout_type: self.template.workout_type,
            ftp: config.ftp,
            zone2_power: config.zone2_power(),
            power_band: self.template.power_band,
            total_duration_minutes: self.total_duration_seconds() / 60,
            hr_target: config.hr_target(),
            hr_zone: config.hr_zone,
            hr_target_mode: self.template.workout_type.is_hr_targeted(),
            segments: self
                .template
                .segments
                .iter()
                .map(|s| SegmentSummary {
                    name: s.name.clone(),
                    duration_minutes: s.duration_seconds / 60,
                    power_start: s.start_power,
                    power_end: s.end_power,
                    phase: s.phase,
                })
                .collect(),
        }
    }
}

impl Default for WorkoutEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
