//! End-to-end heart rate zone alerting through the session coordinator.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use zoneride::audio::{ChannelNotifier, Notification, Notifier, Sound};
use zoneride::metrics::alerts::{AlertKind, Severity};
use zoneride::sensors::types::{DiscoveryResult, HrSample, SensorEvent};
use zoneride::session::{CoreEvent, SessionCoordinator};
use zoneride::storage::config::AppConfig;

use crate::sensor_mock::MockLink;

fn hr(bpm: u16) -> SensorEvent {
    SensorEvent::HeartRate(HrSample {
        heart_rate_bpm: bpm,
        timestamp: Utc::now(),
    })
}

/// Feed 150 bpm once a second for 15 s, starting inside the main set.
///
/// Returns the alerts seen after each sample and every notification.
async fn ride_above_zone(config: AppConfig) -> (Vec<Vec<CoreEvent>>, Vec<Notification>) {
    let link = MockLink::spawn(DiscoveryResult::default());
    let (sink, notifications) = ChannelNotifier::channel();
    let mut coordinator =
        SessionCoordinator::new(config, link.handle.clone(), Notifier::new(Box::new(sink), true));
    let events = coordinator.event_receiver();
    let (sensors, sensor_rx) = mpsc::unbounded_channel();
    let (session, _task) = coordinator.spawn(sensor_rx);

    session.start_workout().await.unwrap();
    // 5 min warmup, then the Zone 2 block
    tokio::time::sleep(Duration::from_millis(300_500)).await;
    let _ = events.try_iter().count();
    let _ = notifications.try_iter().count();

    let mut per_sample = Vec::new();
    for _ in 0..15 {
        sensors.send(hr(150)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        per_sample.push(
            events
                .try_iter()
                .filter(|e| matches!(e, CoreEvent::Alert(_)))
                .collect(),
        );
        tokio::time::sleep(Duration::from_millis(990)).await;
    }

    (per_sample, notifications.try_iter().collect())
}

#[tokio::test(start_paused = true)]
async fn test_sustained_high_hr_alerts_once_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.recording.output_dir = dir.path().join("rides");
    config.recording.backup_dir = dir.path().join("backups");

    let (per_sample, notifications) = ride_above_zone(config).await;

    for (second, alerts) in per_sample.iter().enumerate() {
        if second == 10 {
            assert_eq!(alerts.len(), 1, "expected the alert at second 10");
            match &alerts[0] {
                CoreEvent::Alert(alert) => {
                    assert_eq!(alert.kind, AlertKind::HrHigh);
                    assert_eq!(alert.severity, Severity::Warning);
                    assert_eq!(
                        alert.message,
                        "Heart rate too HIGH: 150 bpm (Zone 2 max: 143). Ease up!"
                    );
                }
                other => panic!("unexpected event {:?}", other),
            }
        } else {
            assert!(alerts.is_empty(), "unexpected alert at second {}", second);
        }
    }

    assert_eq!(
        notifications,
        vec![
            Notification::Sound(Sound::Alert),
            Notification::Speech("Warning: Heart rate too high. Ease up.".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_alert_switches_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.recording.output_dir = dir.path().join("rides");
    config.recording.backup_dir = dir.path().join("backups");
    config.alerts.audio_enabled = false;
    config.alerts.visual_enabled = false;

    let (per_sample, notifications) = ride_above_zone(config).await;

    assert!(per_sample.iter().all(Vec::is_empty));
    assert!(notifications.is_empty());
}
