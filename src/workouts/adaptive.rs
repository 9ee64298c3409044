//! Heart-rate driven power control for HR-targeted segments.

use std::time::{Duration, Instant};

use crate::metrics::ring::{mean, RingBuffer};
use crate::metrics::zones::HeartRateZone;
use crate::workouts::types::PowerBand;

/// Watts per adjustment step.
pub const POWER_STEP_WATTS: i32 = 5;
/// Minimum time between adjustments.
pub const ADJUSTMENT_INTERVAL: Duration = Duration::from_secs(30);
/// Heart rate samples kept for averaging.
pub const HR_WINDOW_SIZE: usize = 30;
/// Samples required before the first adjustment.
pub const MIN_HR_SAMPLES: usize = 10;

/// Power change for a window-average heart rate.
///
/// Far outside the zone moves two steps, outside one step, and inside the
/// zone but more than 3 bpm off the midpoint nudges one step back toward it.
pub fn power_delta(avg_hr: f64, zone: &HeartRateZone, step: i32) -> i32 {
    let low = zone.low as f64;
    let high = zone.high as f64;
    let target = zone.midpoint() as f64;

    if avg_hr > high + 5.0 {
        -2 * step
    } else if avg_hr > high {
        -step
    } else if avg_hr < low - 5.0 {
        2 * step
    } else if avg_hr < low {
        step
    } else if avg_hr > target + 3.0 {
        -step
    } else if avg_hr < target - 3.0 {
        step
    } else {
        0
    }
}

/// Adaptive state owned by the workout engine.
#[derive(Debug, Clone)]
pub struct AdaptiveControlState {
    /// Whether HR control is armed
    enabled: bool,
    /// Current adaptive power in watts
    current_power: u16,
    /// Most recent heart rate samples
    hr_window: RingBuffer<u16>,
    /// When power was last adjusted (or control armed)
    last_adjustment: Option<Instant>,
}

impl Default for AdaptiveControlState {
    fn default() -> Self {
        Self {
            enabled: false,
            current_power: 0,
            hr_window: RingBuffer::new(HR_WINDOW_SIZE),
            last_adjustment: None,
        }
    }
}

impl AdaptiveControlState {
    /// Arm HR control starting from `power`, discarding earlier samples.
    pub fn arm(&mut self, power: u16, now: Instant) {
        self.enabled = true;
        self.current_power = power;
        self.hr_window.clear();
        self.last_adjustment = Some(now);
        tracing::info!("HR-targeted power control armed at {}W", power);
    }

    /// Reset to `power` without arming, as at workout start.
    pub fn reset(&mut self, power: u16, now: Instant) {
        self.enabled = false;
        self.current_power = power;
        self.hr_window.clear();
        self.last_adjustment = Some(now);
    }

    pub fn disarm(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_power(&self) -> u16 {
        self.current_power
    }

    /// Pull the adaptive power into `band` after the band moved.
    ///
    /// Returns the new power when clamping changed it.
    pub fn clamp_to(&mut self, band: &PowerBand) -> Option<u16> {
        let clamped = band.clamp(self.current_power as i32);
        if clamped == self.current_power {
            return None;
        }
        self.current_power = clamped;
        Some(clamped)
    }

    /// Number of samples in the averaging window.
    pub fn sample_count(&self) -> usize {
        self.hr_window.len()
    }

    /// Append a sample while armed; ignored otherwise.
    pub fn record(&mut self, heart_rate: u16) {
        if self.enabled {
            self.hr_window.push(heart_rate);
        }
    }

    /// Adjust power from the window average.
    ///
    /// No-op unless armed, at least [`MIN_HR_SAMPLES`] are held and
    /// [`ADJUSTMENT_INTERVAL`] has passed. Returns the new power only when it
    /// differs from the previous one.
    pub fn adjust(&mut self, now: Instant, zone: &HeartRateZone, band: &PowerBand) -> Option<u16> {
        if !self.enabled || self.hr_window.len() < MIN_HR_SAMPLES {
            return None;
        }

        if let Some(last) = self.last_adjustment {
            if now.saturating_duration_since(last) < ADJUSTMENT_INTERVAL {
                return None;
            }
        }
        self.last_adjustment = Some(now);

        let avg_hr = mean(self.hr_window.iter());
        let old_power = self.current_power;
        let new_power = band.clamp(old_power as i32 + power_delta(avg_hr, zone, POWER_STEP_WATTS));

        if new_power == old_power {
            return None;
        }

        tracing::info!(
            "HR avg {:.0} bpm (target {}): power {}W -> {}W",
            avg_hr,
            zone.midpoint(),
            old_power,
            new_power
        );
        self.current_power = new_power;
        Some(new_power)
    }
}
