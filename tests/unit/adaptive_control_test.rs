//! Unit tests for HR-driven power adjustment.

use std::time::{Duration, Instant};

use zoneride::metrics::zones::HeartRateZone;
use zoneride::workouts::adaptive::{AdaptiveControlState, ADJUSTMENT_INTERVAL, HR_WINDOW_SIZE};
use zoneride::workouts::types::TrainingConfig;

/// Rider whose heart rate settles 10 bpm below the power in watts.
fn steady_state_hr(power: u16) -> u16 {
    power - 10
}

#[test]
fn test_adaptive_power_reaches_fixed_point() {
    let config = TrainingConfig::default();
    let zone = config.hr_zone;
    let band = config.power_band();

    let mut now = Instant::now();
    let mut state = AdaptiveControlState::default();
    state.arm(config.zone2_power(), now);

    let mut changes = Vec::new();
    for _ in 0..12 {
        let hr = steady_state_hr(state.current_power());
        for _ in 0..HR_WINDOW_SIZE {
            state.record(hr);
        }
        now += ADJUSTMENT_INTERVAL;
        changes.push(state.adjust(now, &zone, &band));

        let power = state.current_power();
        assert!(band.low <= power && power <= band.high);
    }

    // 139 W -> HR 129, below target - 3, one step up; 144 W -> HR 134 holds
    assert_eq!(changes[0], Some(144));
    assert!(changes[1..].iter().all(Option::is_none));
    assert_eq!(state.current_power(), 144);
}

#[test]
fn test_runaway_heart_rate_pins_to_band_floor() {
    let config = TrainingConfig::default();
    let zone = config.hr_zone;
    let band = config.power_band();

    let mut now = Instant::now();
    let mut state = AdaptiveControlState::default();
    state.arm(config.zone2_power(), now);

    for _ in 0..20 {
        for _ in 0..HR_WINDOW_SIZE {
            state.record(165);
        }
        now += ADJUSTMENT_INTERVAL;
        state.adjust(now, &zone, &band);
    }

    assert_eq!(state.current_power(), band.low);
    assert_eq!(state.adjust(now + ADJUSTMENT_INTERVAL, &zone, &band), None);
}

#[test]
fn test_adjustment_interval_is_respected() {
    let zone = HeartRateZone::new(124, 143);
    let band = TrainingConfig::default().power_band();

    let start = Instant::now();
    let mut state = AdaptiveControlState::default();
    state.arm(139, start);
    for _ in 0..HR_WINDOW_SIZE {
        state.record(150);
    }

    assert_eq!(state.adjust(start + Duration::from_secs(29), &zone, &band), None);
    assert_eq!(
        state.adjust(start + ADJUSTMENT_INTERVAL, &zone, &band),
        Some(129)
    );
    // Next adjustment is measured from the last one
    assert_eq!(
        state.adjust(start + ADJUSTMENT_INTERVAL + Duration::from_secs(10), &zone, &band),
        None
    );
}
