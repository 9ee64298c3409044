//! Integration tests for the session coordinator against a mock link.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;
use zoneride::audio::{ChannelNotifier, Notification, Notifier, Sound};
use zoneride::metrics::alerts::Severity;
use zoneride::sensors::discovery::{build_discovery_result, describe_device};
use zoneride::sensors::types::{BikeSample, DiscoveryResult, HrSample, SensorEvent};
use zoneride::session::{CoreEvent, SessionCommand, SessionCoordinator, SessionHandle};
use zoneride::storage::config::{load_config_from, AppConfig};
use zoneride::workouts::types::WorkoutPhase;

use crate::sensor_mock::{LinkCall, MockLink};

struct Harness {
    link: MockLink,
    session: SessionHandle,
    task: tokio::task::JoinHandle<()>,
    events: Receiver<CoreEvent>,
    notifications: Receiver<Notification>,
    sensors: mpsc::UnboundedSender<SensorEvent>,
}

fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.recording.output_dir = dir.join("rides");
    config.recording.backup_dir = dir.join("backups");
    config
}

fn start(config: AppConfig, scan: DiscoveryResult) -> Harness {
    start_with_path(config, scan, None)
}

fn start_with_path(
    config: AppConfig,
    scan: DiscoveryResult,
    config_path: Option<&Path>,
) -> Harness {
    let link = MockLink::spawn(scan);
    let (sink, notifications) = ChannelNotifier::channel();
    let mut coordinator = SessionCoordinator::new(
        config,
        link.handle.clone(),
        Notifier::new(Box::new(sink), true),
    );
    if let Some(path) = config_path {
        coordinator = coordinator.with_config_path(path.to_path_buf());
    }
    let events = coordinator.event_receiver();
    let (sensors, sensor_rx) = mpsc::unbounded_channel();
    let (session, task) = coordinator.spawn(sensor_rx);

    Harness {
        link,
        session,
        task,
        events,
        notifications,
        sensors,
    }
}

/// Let spawned tasks run without crossing the next 1 s tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn drain<T>(rx: &Receiver<T>) -> Vec<T> {
    rx.try_iter().collect()
}

#[tokio::test(start_paused = true)]
async fn test_start_commands_warmup_power() {
    let dir = tempfile::tempdir().unwrap();
    let h = start(test_config(dir.path()), DiscoveryResult::default());

    h.session.start_workout().await.unwrap();
    settle().await;

    let ordered: Vec<CoreEvent> = drain(&h.events)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::PhaseChange { .. } | CoreEvent::PowerChange(_)))
        .collect();
    assert_eq!(
        ordered,
        vec![
            CoreEvent::PhaseChange {
                phase: WorkoutPhase::Warmup,
                name: "Warmup".to_string(),
            },
            CoreEvent::PowerChange(86),
        ]
    );
    assert_eq!(h.link.power_targets(), vec![86]);

    let notes = drain(&h.notifications);
    assert_eq!(notes[0], Notification::Sound(Sound::Start));
    assert!(notes.contains(&Notification::Speech(
        "Starting warmup. Ramping to 139 watts.".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_data_reports_and_stops_erg_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = start(test_config(dir.path()), DiscoveryResult::default());

    h.session.start_workout().await.unwrap();
    settle().await;
    h.session.stop_workout().await.unwrap();
    h.session.stop_workout().await.unwrap();
    settle().await;

    let events = drain(&h.events);
    let notices: Vec<&CoreEvent> = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::Notice { .. }))
        .collect();
    assert_eq!(
        notices,
        vec![&CoreEvent::Notice {
            message: "No data recorded.".to_string(),
            severity: Severity::Warning,
        }]
    );
    assert!(!events.iter().any(|e| matches!(e, CoreEvent::WorkoutSaved(_))));
    assert_eq!(h.link.count(&LinkCall::StopErg), 1);
    assert!(drain(&h.notifications).contains(&Notification::Speech(
        "Workout stopped. Saving file.".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn test_recorded_ride_is_saved_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let h = start(test_config(dir.path()), DiscoveryResult::default());
    let _ = h.link.hr_tx.send(HrSample {
        heart_rate_bpm: 131,
        timestamp: Utc::now(),
    });

    h.session.start_workout().await.unwrap();
    settle().await;

    for i in 0..5 {
        let sample = BikeSample {
            power_watts: 120 + i,
            cadence_rpm: 88,
            speed_kmh: 28.8,
            timestamp: Utc::now() + chrono::Duration::seconds(i as i64),
        };
        h.sensors.send(SensorEvent::Bike(sample)).unwrap();
    }
    settle().await;

    let bikes: Vec<u16> = drain(&h.events)
        .into_iter()
        .filter_map(|e| match e {
            CoreEvent::Bike { target_power, .. } => Some(target_power),
            _ => None,
        })
        .collect();
    assert_eq!(bikes, vec![86; 5]);

    h.session.stop_workout().await.unwrap();
    settle().await;

    let saved = drain(&h.events)
        .into_iter()
        .find_map(|e| match e {
            CoreEvent::WorkoutSaved(path) => Some(path),
            _ => None,
        })
        .expect("ride saved");
    assert!(saved.starts_with(dir.path().join("rides")));

    let messages = fitparser::from_bytes(&std::fs::read(&saved).unwrap()).unwrap();
    let records = messages
        .iter()
        .filter(|m| m.kind() == fitparser::profile::MesgNum::Record)
        .count();
    assert_eq!(records, 5);
}

#[tokio::test(start_paused = true)]
async fn test_workout_reaches_main_set() {
    let dir = tempfile::tempdir().unwrap();
    let h = start(test_config(dir.path()), DiscoveryResult::default());

    h.session.start_workout().await.unwrap();
    tokio::time::sleep(Duration::from_secs(302)).await;

    let events = drain(&h.events);
    assert!(events.contains(&CoreEvent::PhaseChange {
        phase: WorkoutPhase::Main,
        name: "Zone 2".to_string(),
    }));

    // Warmup ramps 86 W -> 139 W, one write per distinct target
    let targets = h.link.power_targets();
    assert_eq!(targets.first(), Some(&86));
    assert_eq!(targets.last(), Some(&139));
    assert!(targets.windows(2).all(|pair| pair[0] < pair[1]));

    let status = events
        .iter()
        .rev()
        .find_map(|e| match e {
            CoreEvent::WorkoutStatus(progress) => Some(progress.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(status.phase, WorkoutPhase::Main);
    assert_eq!(status.segment_index, 1);
    assert!(status.hr_target_mode);
}

#[tokio::test(start_paused = true)]
async fn test_scan_connects_filter_matches() {
    let dir = tempfile::tempdir().unwrap();
    let scan = build_discovery_result(
        vec![
            describe_device("AA:01", "KICKR CORE", Some(-60)),
            describe_device("AA:02", "MYZONE MZ-Switch", Some(-58)),
        ],
        "KICKR",
        "MYZONE",
    );
    let h = start(test_config(dir.path()), scan);

    h.session.scan().await.unwrap();
    settle().await;

    let calls = h.link.calls();
    assert_eq!(
        &calls[..3],
        &[
            LinkCall::Scan,
            LinkCall::ConnectTrainer(None),
            LinkCall::ConnectHeartRate
        ]
    );

    let events = drain(&h.events);
    assert!(events.iter().any(|e| matches!(e, CoreEvent::ScanResult(_))));
    let status = events
        .iter()
        .find_map(|e| match e {
            CoreEvent::DeviceStatus(status) => Some(status.clone()),
            _ => None,
        })
        .expect("device status reported");
    assert!(status.trainer_connected());
    assert!(status.hr_connected());
}

#[tokio::test(start_paused = true)]
async fn test_config_changes_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let h = start_with_path(
        test_config(dir.path()),
        DiscoveryResult::default(),
        Some(&path),
    );

    h.session.send(SessionCommand::UpdateFtp(250)).await.unwrap();
    h.session
        .send(SessionCommand::SetWorkoutType("tempo".to_string()))
        .await
        .unwrap();
    h.session
        .send(SessionCommand::SetWorkoutType("marathon".to_string()))
        .await
        .unwrap();
    settle().await;

    let saved = load_config_from(&path).unwrap();
    assert_eq!(saved.user.ftp, 250);
    assert_eq!(saved.workout.workout_type, "tempo");

    let events = drain(&h.events);
    let summary = events
        .iter()
        .rev()
        .find_map(|e| match e {
            CoreEvent::WorkoutSummary(summary) => Some(summary.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(summary.ftp, 250);
    // Tempo blocks at 97% FTP
    assert_eq!(summary.segments[1].power_start, 242);
    assert!(events
        .iter()
        .any(|e| matches!(e, CoreEvent::Notice { severity: Severity::Warning, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_workout_and_disconnects() {
    let dir = tempfile::tempdir().unwrap();
    let h = start(test_config(dir.path()), DiscoveryResult::default());

    h.session.start_workout().await.unwrap();
    settle().await;
    h.session.shutdown().await.unwrap();
    h.task.await.unwrap();

    let calls = h.link.calls();
    let stop = calls.iter().position(|c| *c == LinkCall::StopErg).unwrap();
    let disconnect = calls
        .iter()
        .position(|c| *c == LinkCall::DisconnectAll)
        .unwrap();
    assert!(stop < disconnect);
    assert!(h.session.start_workout().await.is_err());
}
