//! Session coordinator.
//!
//! A single task owns the workout engine, zone analyzer and recorder. It
//! selects over user commands, decoded sensor events and a 1 Hz tick, so every
//! tick sees one consistent configuration and samples are handled in arrival
//! order. Radio work runs elsewhere: ERG writes go through the
//! [`ControlWriter`] queue and scan/connect requests run as detached tasks.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::{cues, phase_announcement, Notifier, Sound};
use crate::metrics::alerts::Severity;
use crate::metrics::analyzer::ZoneAnalyzer;
use crate::metrics::zones::HeartRateZone;
use crate::recording::recorder::SessionRecorder;
use crate::recording::types::SessionRecord;
use crate::sensors::link::LinkHandle;
use crate::sensors::types::{BikeSample, HrSample, SensorError, SensorEvent};
use crate::session::types::{CoreEvent, SessionCommand, SessionError};
use crate::session::writer::{ControlWrite, ControlWriter};
use crate::storage::config::{save_config_to, AppConfig};
use crate::workouts::engine::WorkoutEngine;
use crate::workouts::types::{WorkoutEvent, WorkoutPhase, WorkoutType};

/// Training tick period.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Clonable handle for sending commands to a running coordinator.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).await.map_err(|_| SessionError::Closed)
    }

    pub async fn start_workout(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StartWorkout).await
    }

    pub async fn stop_workout(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StopWorkout).await
    }

    pub async fn scan(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Scan).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Outbound event sender; a no-op until a receiver is requested.
#[derive(Debug, Clone, Default)]
struct EventSink(Option<Sender<CoreEvent>>);

impl EventSink {
    fn send(&self, event: CoreEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }

    fn notice(&self, message: impl Into<String>, severity: Severity) {
        self.send(CoreEvent::Notice {
            message: message.into(),
            severity,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Stopped,
    Completed,
}

/// Event/tick coordinator for one rider.
pub struct SessionCoordinator {
    config: AppConfig,
    /// Where config changes are persisted, if anywhere
    config_path: Option<PathBuf>,
    link: LinkHandle,
    engine: WorkoutEngine,
    engine_events: Receiver<WorkoutEvent>,
    analyzer: ZoneAnalyzer,
    recorder: SessionRecorder,
    notifier: Notifier,
    events: EventSink,
    /// Present while the coordinator task runs
    writer: Option<ControlWriter>,
    /// Whether a workout is in progress
    active: bool,
}

impl SessionCoordinator {
    pub fn new(config: AppConfig, link: LinkHandle, mut notifier: Notifier) -> Self {
        notifier.set_enabled(config.alerts.audio_enabled);
        let mut engine = WorkoutEngine::new(config.workout_type(), config.training_config());
        let engine_events = engine.event_receiver();

        Self {
            analyzer: ZoneAnalyzer::new(config.analyzer_config()),
            recorder: SessionRecorder::new(config.recorder_config()),
            config,
            config_path: None,
            link,
            engine,
            engine_events,
            notifier,
            events: EventSink::default(),
            writer: None,
            active: false,
        }
    }

    /// Persist config changes to `path`.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Get a receiver for outbound events.
    pub fn event_receiver(&mut self) -> Receiver<CoreEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.events = EventSink(Some(tx));
        rx
    }

    /// Start the coordinator task. Must be called inside a tokio runtime.
    pub fn spawn(
        self,
        sensor_events: mpsc::UnboundedReceiver<SensorEvent>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(self.run(rx, sensor_events));
        (SessionHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut sensor_events: mpsc::UnboundedReceiver<SensorEvent>,
    ) {
        let (writer, writer_task) = ControlWriter::spawn(self.link.clone());
        self.writer = Some(writer);
        self.events.send(CoreEvent::WorkoutSummary(self.engine.summary()));

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Session coordinator started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = sensor_events.recv() => self.handle_sensor_event(event),
                _ = tick.tick() => self.on_tick(),
            }
        }

        self.finish(FinishReason::Stopped);
        // Closing the queue lets pending writes, including the final StopErg, drain
        self.writer = None;
        let _ = writer_task.await;
        if let Err(e) = self.link.disconnect_all().await {
            tracing::warn!("Disconnect on shutdown failed: {}", e);
        }
        tracing::info!("Session coordinator stopped");
    }

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn write(&self, write: ControlWrite) {
        if let Some(writer) = &self.writer {
            writer.submit(write);
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        tracing::debug!("Session command: {:?}", command);
        match command {
            SessionCommand::StartWorkout => self.start_workout(),
            SessionCommand::StopWorkout => self.finish(FinishReason::Stopped),
            SessionCommand::SetWorkoutType(id) => self.set_workout_type(&id),
            SessionCommand::UpdateFtp(ftp) => self.update_ftp(ftp),
            SessionCommand::UpdateHrZones { low, high } => self.update_hr_zones(low, high),
            SessionCommand::SetErgPower(watts) => self.write(ControlWrite::SetTargetPower(watts)),
            SessionCommand::StopErg => self.write(ControlWrite::StopErg),
            command @ (SessionCommand::Scan
            | SessionCommand::ConnectTrainer { .. }
            | SessionCommand::DisconnectTrainer
            | SessionCommand::SetDeviceFilter { .. }) => {
                tokio::spawn(device_command(
                    self.link.clone(),
                    command,
                    self.events.clone(),
                ));
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Bike(sample) => self.on_bike(sample),
            SensorEvent::HeartRate(sample) => self.on_heart_rate(sample),
            SensorEvent::StateChanged { role, state } => {
                self.events.send(CoreEvent::LinkState { role, state });
            }
            SensorEvent::Error(message) => {
                tracing::warn!("Device link error: {}", message);
                self.events.notice(message, Severity::Warning);
            }
        }
    }

    fn on_bike(&mut self, sample: BikeSample) {
        let target_power = if self.active {
            self.engine.target_power()
        } else {
            0
        };
        self.events.send(CoreEvent::Bike {
            sample,
            target_power,
        });

        if self.active {
            let heart_rate = self.link.latest_hr().heart_rate_bpm;
            self.recorder.add_record(SessionRecord::new(
                sample.timestamp,
                heart_rate,
                sample.power_watts,
                sample.cadence_rpm,
                sample.speed_mps(),
            ));
        }
    }

    fn on_heart_rate(&mut self, sample: HrSample) {
        self.events.send(CoreEvent::HeartRate(sample));
        if !self.active {
            return;
        }

        let heart_rate = sample.heart_rate_bpm;
        let bike = self.link.latest_bike();
        let phase = self.engine.current_phase();
        let now = self.now();

        for alert in self
            .analyzer
            .update(heart_rate, bike.power_watts, bike.cadence_rpm, phase, now)
        {
            self.notifier.play_sound(Sound::Alert);
            self.notifier.alert(&alert);
            if self.config.alerts.visual_enabled {
                self.events.send(CoreEvent::Alert(alert));
            }
        }
        self.events.send(CoreEvent::Stats(self.analyzer.stats()));
        self.engine.record_heart_rate(heart_rate);

        // HR-only record while the trainer reports no power
        if bike.power_watts == 0 {
            self.recorder.add_record(SessionRecord::new(
                sample.timestamp,
                heart_rate,
                0,
                0,
                0.0,
            ));
        }
    }

    fn on_tick(&mut self) {
        if !self.active {
            return;
        }

        let now = self.now();
        self.engine.tick(now);
        self.engine.adjust_adaptive_power(now);

        if self.drain_engine_events() {
            self.finish(FinishReason::Completed);
        } else {
            self.events
                .send(CoreEvent::WorkoutStatus(self.engine.progress(now)));
        }
    }

    /// Forward engine events in order. Returns true once the workout completed.
    fn drain_engine_events(&mut self) -> bool {
        let mut completed = false;
        let pending: Vec<WorkoutEvent> = self.engine_events.try_iter().collect();

        for event in pending {
            match event {
                WorkoutEvent::PhaseChanged { phase, name } => {
                    let segment = if phase == WorkoutPhase::Completed {
                        None
                    } else {
                        self.engine.current_segment()
                    };
                    self.notifier.announce(&phase_announcement(phase, segment));
                    self.events.send(CoreEvent::PhaseChange { phase, name });
                }
                WorkoutEvent::PowerChanged(watts) => {
                    tracing::info!("ERG power target: {}W", watts);
                    self.write(ControlWrite::SetTargetPower(
                        watts.min(i16::MAX as u16) as i16,
                    ));
                    self.events.send(CoreEvent::PowerChange(watts));
                }
                WorkoutEvent::Completed => completed = true,
            }
        }
        completed
    }

    fn start_workout(&mut self) {
        if self.active {
            self.events
                .notice("Workout already running.", Severity::Warning);
            return;
        }

        self.analyzer.reset();
        self.recorder.clear();

        let now = self.now();
        if let Err(e) = self.engine.start(now) {
            tracing::warn!("Cannot start workout: {}", e);
            self.events.notice(e.to_string(), Severity::Warning);
            return;
        }

        self.active = true;
        self.notifier.play_sound(Sound::Start);
        self.drain_engine_events();
        self.events
            .send(CoreEvent::WorkoutStatus(self.engine.progress(now)));
    }

    /// Stop path. Idempotent: only the first call after a start has effect.
    fn finish(&mut self, reason: FinishReason) {
        if !self.active {
            return;
        }
        self.active = false;
        self.engine.stop();

        self.write(ControlWrite::StopErg);
        self.notifier.play_sound(Sound::Stop);
        self.notifier.announce(match reason {
            FinishReason::Completed => cues::WORKOUT_COMPLETE,
            FinishReason::Stopped => cues::WORKOUT_STOPPED,
        });

        if self.recorder.record_count() > 0 {
            match self.recorder.export_to_file(&self.config.recording.output_dir) {
                Ok(path) => {
                    self.notifier.announce(cues::WORKOUT_SAVED);
                    self.events.send(CoreEvent::WorkoutSaved(path));
                }
                Err(e) => {
                    tracing::error!("Failed to save workout: {}", e);
                    self.events
                        .notice(format!("Failed to save workout: {}", e), Severity::Critical);
                }
            }
        } else {
            self.events.notice("No data recorded.", Severity::Warning);
        }
        self.recorder.clear();

        if reason == FinishReason::Completed {
            self.events.send(CoreEvent::WorkoutComplete);
        }
        self.events
            .send(CoreEvent::WorkoutStatus(self.engine.progress(self.now())));
        tracing::info!("Workout finished ({:?})", reason);
    }

    fn set_workout_type(&mut self, id: &str) {
        let result = id
            .parse::<WorkoutType>()
            .and_then(|workout_type| self.engine.set_workout_type(workout_type));
        match result {
            Ok(()) => {
                self.config.workout.workout_type = self.engine.workout_type().id().to_string();
                self.config_changed();
            }
            Err(e) => {
                tracing::warn!("Workout selection refused: {}", e);
                self.events.notice(e.to_string(), Severity::Warning);
            }
        }
    }

    fn update_ftp(&mut self, ftp: u16) {
        self.config.user.ftp = ftp;
        self.engine.set_ftp(ftp);
        self.config_changed();
    }

    fn update_hr_zones(&mut self, low: u16, high: u16) {
        self.config.user.zone2_hr_low = low;
        self.config.user.zone2_hr_high = high;
        self.engine.set_hr_zone(HeartRateZone::new(low, high));
        self.analyzer.update_zones(low, high);
        self.config_changed();
    }

    fn config_changed(&self) {
        if let Some(path) = &self.config_path {
            if let Err(e) = save_config_to(&self.config, path) {
                tracing::warn!("Failed to save config: {}", e);
            }
        }
        self.events
            .send(CoreEvent::WorkoutSummary(self.engine.summary()));
    }
}

/// Run a device command off the coordinator task, then report link status.
async fn device_command(link: LinkHandle, command: SessionCommand, events: EventSink) {
    let result = match command {
        SessionCommand::Scan => scan_and_connect(&link, &events).await,
        SessionCommand::ConnectTrainer { address, name } => {
            link.connect_trainer(address, name).await
        }
        SessionCommand::DisconnectTrainer => link.disconnect_trainer().await,
        SessionCommand::SetDeviceFilter {
            trainer,
            heart_rate,
        } => link.set_filters(trainer, heart_rate).await,
        _ => Ok(()),
    };

    if let Err(e) = result {
        tracing::warn!("Device command failed: {}", e);
        events.notice(e.to_string(), Severity::Warning);
    }

    match link.status().await {
        Ok(status) => events.send(CoreEvent::DeviceStatus(status)),
        Err(e) => tracing::debug!("Device status unavailable: {}", e),
    }
}

/// Scan, then connect whatever the name filters selected.
async fn scan_and_connect(link: &LinkHandle, events: &EventSink) -> Result<(), SensorError> {
    let result = link.scan().await?;
    tracing::info!(
        "Scan found {} devices ({} trainers, {} HR monitors)",
        result.all_devices.len(),
        result.trainers.len(),
        result.hr_monitors.len()
    );

    let connect_trainer = result.selected_trainer.is_some();
    let connect_hr = result.selected_hr_monitor.is_some();
    events.send(CoreEvent::ScanResult(result));

    if connect_trainer {
        if let Err(e) = link.connect_trainer(None, None).await {
            tracing::warn!("Trainer connect failed: {}", e);
            events.notice(format!("Trainer connect failed: {}", e), Severity::Warning);
        }
    }
    if connect_hr {
        link.connect_hr_monitor().await?;
    }
    Ok(())
}
