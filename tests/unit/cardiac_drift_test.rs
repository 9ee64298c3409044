//! Unit tests for cardiac drift and decoupling detection.

use std::time::{Duration, Instant};

use zoneride::metrics::alerts::{AlertKind, Severity};
use zoneride::metrics::analyzer::{AnalyzerConfig, ZoneAnalyzer};
use zoneride::metrics::zones::HeartRateZone;
use zoneride::workouts::types::WorkoutPhase;

/// Analyzer whose zone is wide enough that only efficiency alerts fire.
fn wide_zone_analyzer() -> ZoneAnalyzer {
    ZoneAnalyzer::new(AnalyzerConfig {
        zone: HeartRateZone::new(60, 200),
        ..AnalyzerConfig::default()
    })
}

#[test]
fn test_rising_hr_at_constant_power_fires_one_drift_alert() {
    let mut analyzer = wide_zone_analyzer();
    let start = Instant::now();
    let mut drift_alerts = Vec::new();

    // HR climbs 120 -> 140 over 301 samples at a steady 150 W
    for i in 0..=300u64 {
        let hr = 120 + (i * 20 / 300) as u16;
        let now = start + Duration::from_secs(i);
        for alert in analyzer.update(hr, 150, 90, WorkoutPhase::Main, now) {
            if alert.kind == AlertKind::CardiacDrift {
                drift_alerts.push((i, alert));
            }
        }
    }

    assert_eq!(drift_alerts.len(), 1);
    let (at, alert) = &drift_alerts[0];
    assert_eq!(*at, 300);
    assert_eq!(alert.severity, Severity::Warning);
    assert!(alert.message.starts_with("Cardiac drift detected:"));
    assert!(analyzer.stats().cardiac_drift_percent > 5.0);

    // Still drifting, but within the cooldown window
    for i in 301..320u64 {
        let now = start + Duration::from_secs(i);
        let alerts = analyzer.update(141, 150, 90, WorkoutPhase::Main, now);
        assert!(alerts.iter().all(|a| a.kind != AlertKind::CardiacDrift));
    }
}

#[test]
fn test_no_drift_before_enough_samples() {
    let mut analyzer = wide_zone_analyzer();
    let start = Instant::now();

    for i in 0..300u64 {
        let hr = 110 + (i / 5) as u16;
        let now = start + Duration::from_secs(i);
        assert!(analyzer
            .update(hr, 150, 90, WorkoutPhase::Main, now)
            .is_empty());
    }
    assert_eq!(analyzer.stats().cardiac_drift_percent, 0.0);
}

#[test]
fn test_power_fade_with_flat_hr_is_decoupling() {
    let mut analyzer = wide_zone_analyzer();
    let start = Instant::now();
    let mut decoupling = Vec::new();

    for i in 0..=600u64 {
        let power = if i < 300 { 200 } else { 150 };
        let now = start + Duration::from_secs(i);
        for alert in analyzer.update(130, power, 90, WorkoutPhase::Main, now) {
            if alert.kind == AlertKind::Decoupling {
                decoupling.push((i, alert));
            }
        }
    }

    assert_eq!(decoupling.len(), 1);
    let (at, alert) = &decoupling[0];
    assert_eq!(*at, 600);
    assert!(alert.message.starts_with("Power/HR decoupling: Power down"));
}

#[test]
fn test_steady_effort_raises_nothing() {
    let mut analyzer = wide_zone_analyzer();
    let start = Instant::now();

    for i in 0..700u64 {
        let now = start + Duration::from_secs(i);
        assert!(analyzer
            .update(132, 160, 88, WorkoutPhase::Main, now)
            .is_empty());
    }

    let stats = analyzer.stats();
    assert!((stats.efficiency_factor - 160.0 / 132.0).abs() < 1e-9);
    assert_eq!(stats.cardiac_drift_percent, 0.0);
    assert!((stats.zone_percent() - 100.0).abs() < 1e-9);
}
