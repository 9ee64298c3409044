//! Unit tests for segment power interpolation and template structure.

use zoneride::workouts::library::build_template;
use zoneride::workouts::types::{TrainingConfig, WorkoutPhase, WorkoutSegment, WorkoutType};

#[test]
fn test_power_at_endpoints_and_monotonic() {
    let cases = [
        (1u32, 100u16, 200u16),
        (60, 86, 139),
        (300, 139, 86),
        (1200, 193, 193),
        (7, 250, 100),
    ];

    for (duration, start, end) in cases {
        let segment = WorkoutSegment::new("Ramp", duration, start, end, WorkoutPhase::Main);

        assert_eq!(segment.power_at(0), start, "start of {:?}", segment);
        assert_eq!(segment.power_at(duration), end, "end of {:?}", segment);

        let powers: Vec<u16> = (0..=duration).map(|t| segment.power_at(t)).collect();
        for pair in powers.windows(2) {
            if start <= end {
                assert!(pair[0] <= pair[1], "ramp up not monotonic: {:?}", pair);
            } else {
                assert!(pair[0] >= pair[1], "ramp down not monotonic: {:?}", pair);
            }
        }
    }
}

#[test]
fn test_power_holds_after_segment_end() {
    let segment = WorkoutSegment::new("Warmup", 300, 86, 139, WorkoutPhase::Warmup);
    assert_eq!(segment.power_at(450), 139);
}

#[test]
fn test_ramp_midpoint_truncates() {
    let segment = WorkoutSegment::new("Warmup", 300, 86, 139, WorkoutPhase::Warmup);
    // 86 + 53 * 0.5 = 112.5
    assert_eq!(segment.power_at(150), 112);
}

#[test]
fn test_templates_follow_ftp() {
    let config = TrainingConfig::default();

    let zone2 = build_template(WorkoutType::Zone2, &config);
    assert_eq!(zone2.total_duration_seconds(), 60 * 60);
    assert_eq!(zone2.segments[1].start_power, 139);
    assert!(zone2.is_adaptive_segment(&zone2.segments[1]));

    let sweet_spot = build_template(WorkoutType::SweetSpot, &config);
    assert_eq!(sweet_spot.segments[1].start_power, 193);
    assert_eq!(sweet_spot.segments[2].phase, WorkoutPhase::Recovery);
    assert!(!sweet_spot.is_adaptive_segment(&sweet_spot.segments[1]));

    let stronger = TrainingConfig {
        ftp: 300,
        ..config
    };
    let vo2max = build_template(WorkoutType::Vo2max, &stronger);
    assert_eq!(vo2max.segments[1].start_power, 360);
    assert_eq!(vo2max.segments[2].start_power, 150);
}
