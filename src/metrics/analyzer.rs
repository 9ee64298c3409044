//! Zone analyzer.
//!
//! Accumulates heart rate, power and cadence over a rolling window and raises
//! training quality alerts. Zone time and alerts only count during the main
//! phase; history is recorded in every phase.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::metrics::alerts::{Alert, AlertCooldowns, AlertKind, Severity};
use crate::metrics::ring::{mean, RingBuffer};
use crate::metrics::zones::{HeartRateZone, ZoneStatus};
use crate::workouts::types::WorkoutPhase;

/// Samples needed before cardiac drift is evaluated (~5 minutes at 1 Hz).
const DRIFT_MIN_SAMPLES: usize = 300;
/// Window compared for decoupling; twice this is needed before it is evaluated.
const DECOUPLING_WINDOW: usize = 300;
/// Drift at or above this is critical.
const DRIFT_CRITICAL_PERCENT: f64 = 10.0;
/// BPM above the zone at which a high HR alert turns critical.
const HR_CRITICAL_MARGIN: u16 = 10;

/// Analyzer thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Zone 2 heart rate band
    pub zone: HeartRateZone,
    /// Efficiency loss that raises a drift alert
    pub drift_threshold_percent: f64,
    /// Power/HR gap that raises a decoupling alert
    pub decoupling_threshold_percent: f64,
    /// How long HR must stay out of zone before alerting
    pub hr_alert_delay: Duration,
    /// Minimum gap between two alerts of the same kind
    pub alert_cooldown: Duration,
    /// Rolling window length in samples
    pub history_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            zone: HeartRateZone::default(),
            drift_threshold_percent: 5.0,
            decoupling_threshold_percent: 10.0,
            hr_alert_delay: Duration::from_secs(10),
            alert_cooldown: Duration::from_secs(30),
            history_capacity: 3600,
        }
    }
}

/// Live statistics, derived fresh from the buffers on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStats {
    pub avg_hr: f64,
    pub avg_power: f64,
    pub avg_cadence: f64,
    /// Main-phase seconds inside the zone
    pub seconds_in_zone: f64,
    /// Main-phase seconds above the zone
    pub seconds_above: f64,
    /// Main-phase seconds below the zone
    pub seconds_below: f64,
    /// Average power over average HR
    pub efficiency_factor: f64,
    /// Efficiency loss between history halves, 0 until enough samples
    pub cardiac_drift_percent: f64,
}

impl WorkoutStats {
    /// Share of main-phase time spent in zone, 0-100.
    pub fn zone_percent(&self) -> f64 {
        let total = self.seconds_in_zone + self.seconds_above + self.seconds_below;
        if total > 0.0 {
            self.seconds_in_zone / total * 100.0
        } else {
            0.0
        }
    }
}

/// Rolling heart rate zone and efficiency analysis.
pub struct ZoneAnalyzer {
    config: AnalyzerConfig,
    hr_history: RingBuffer<u16>,
    power_history: RingBuffer<u16>,
    cadence_history: RingBuffer<u16>,
    /// When HR first left the zone in the current excursion
    out_of_zone_since: Option<Instant>,
    cooldowns: AlertCooldowns,
    seconds_in_zone: f64,
    seconds_above: f64,
    seconds_below: f64,
    last_update: Option<Instant>,
}

impl ZoneAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            hr_history: RingBuffer::new(config.history_capacity),
            power_history: RingBuffer::new(config.history_capacity),
            cadence_history: RingBuffer::new(config.history_capacity),
            out_of_zone_since: None,
            cooldowns: AlertCooldowns::new(config.alert_cooldown),
            seconds_in_zone: 0.0,
            seconds_above: 0.0,
            seconds_below: 0.0,
            last_update: None,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn zone(&self) -> HeartRateZone {
        self.config.zone
    }

    /// Number of samples in the rolling window.
    pub fn sample_count(&self) -> usize {
        self.hr_history.len()
    }

    /// Feed one sample. Returns the alerts it raised, in evaluation order.
    pub fn update(
        &mut self,
        hr: u16,
        power: u16,
        cadence: u16,
        phase: WorkoutPhase,
        now: Instant,
    ) -> Vec<Alert> {
        self.hr_history.push(hr);
        self.power_history.push(power);
        self.cadence_history.push(cadence);

        let in_main = phase == WorkoutPhase::Main;

        if let Some(last) = self.last_update {
            if in_main {
                let dt = now.saturating_duration_since(last).as_secs_f64();
                match self.config.zone.status(hr) {
                    ZoneStatus::InZone => self.seconds_in_zone += dt,
                    ZoneStatus::Above => self.seconds_above += dt,
                    ZoneStatus::Below => self.seconds_below += dt,
                }
            }
        }
        self.last_update = Some(now);

        let mut alerts = Vec::new();
        if !in_main {
            return alerts;
        }

        if let Some(alert) = self.check_hr_zone(hr, now) {
            alerts.push(alert);
        }
        if self.hr_history.len() > DRIFT_MIN_SAMPLES {
            if let Some(alert) = self.check_cardiac_drift(now) {
                alerts.push(alert);
            }
        }
        if self.hr_history.len() > DECOUPLING_WINDOW * 2 {
            if let Some(alert) = self.check_decoupling(now) {
                alerts.push(alert);
            }
        }

        for alert in &alerts {
            tracing::info!("Alert [{}/{}]: {}", alert.kind, alert.severity, alert.message);
        }
        alerts
    }

    fn check_hr_zone(&mut self, hr: u16, now: Instant) -> Option<Alert> {
        let zone = self.config.zone;
        if zone.contains(hr) {
            self.out_of_zone_since = None;
            return None;
        }

        let since = *self.out_of_zone_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.config.hr_alert_delay {
            return None;
        }

        let kind = if hr > zone.high {
            AlertKind::HrHigh
        } else {
            AlertKind::HrLow
        };
        if !self.cooldowns.ready(kind, now) {
            return None;
        }
        self.cooldowns.mark(kind, now);

        let alert = match kind {
            AlertKind::HrHigh => Alert::new(
                kind,
                format!(
                    "Heart rate too HIGH: {} bpm (Zone 2 max: {}). Ease up!",
                    hr, zone.high
                ),
                if hr >= zone.high.saturating_add(HR_CRITICAL_MARGIN) {
                    Severity::Critical
                } else {
                    Severity::Warning
                },
            ),
            _ => Alert::new(
                kind,
                format!(
                    "Heart rate too LOW: {} bpm (Zone 2 min: {}). Push a bit harder!",
                    hr, zone.low
                ),
                Severity::Warning,
            ),
        };
        Some(alert)
    }

    fn check_cardiac_drift(&mut self, now: Instant) -> Option<Alert> {
        if !self.cooldowns.ready(AlertKind::CardiacDrift, now) {
            return None;
        }

        let drift = self.drift_percent()?;
        if drift <= self.config.drift_threshold_percent {
            return None;
        }

        self.cooldowns.mark(AlertKind::CardiacDrift, now);
        Some(Alert::new(
            AlertKind::CardiacDrift,
            format!(
                "Cardiac drift detected: {:.1}%. Your HR is creeping up - sign of fatigue.",
                drift
            ),
            if drift < DRIFT_CRITICAL_PERCENT {
                Severity::Warning
            } else {
                Severity::Critical
            },
        ))
    }

    fn check_decoupling(&mut self, now: Instant) -> Option<Alert> {
        if !self.cooldowns.ready(AlertKind::Decoupling, now) {
            return None;
        }

        let len = self.hr_history.len();
        let recent_start = len - DECOUPLING_WINDOW;
        let older_start = recent_start - DECOUPLING_WINDOW;

        let hr_recent = mean(self.hr_history.range(recent_start, len));
        let power_recent = mean(self.power_history.range(recent_start, len));
        let hr_older = mean(self.hr_history.range(older_start, recent_start));
        let power_older = mean(self.power_history.range(older_start, recent_start));

        if hr_older == 0.0 || power_older == 0.0 {
            return None;
        }

        let power_change = (power_recent - power_older) / power_older * 100.0;
        let hr_change = (hr_recent - hr_older) / hr_older * 100.0;

        if power_change >= -5.0 || hr_change <= -2.0 {
            return None;
        }
        if (power_change - hr_change).abs() <= self.config.decoupling_threshold_percent {
            return None;
        }

        self.cooldowns.mark(AlertKind::Decoupling, now);
        Some(Alert::new(
            AlertKind::Decoupling,
            format!(
                "Power/HR decoupling: Power down {:.1}% but HR unchanged. Consider ending soon.",
                power_change.abs()
            ),
            Severity::Warning,
        ))
    }

    /// Efficiency loss between the first and second half of the history.
    ///
    /// `None` when the first half has no HR or no power to compare against.
    fn drift_percent(&self) -> Option<f64> {
        let len = self.hr_history.len();
        let half = len / 2;

        let hr_first = mean(self.hr_history.range(0, half));
        let power_first = mean(self.power_history.range(0, half));
        if hr_first == 0.0 || power_first == 0.0 {
            return None;
        }
        let hr_second = mean(self.hr_history.range(half, len));
        let power_second = mean(self.power_history.range(half, len));

        let ef_first = power_first / hr_first;
        let ef_second = if hr_second > 0.0 {
            power_second / hr_second
        } else {
            0.0
        };
        Some((ef_first - ef_second) / ef_first * 100.0)
    }

    /// Statistics over the current window.
    pub fn stats(&self) -> WorkoutStats {
        let avg_hr = mean(self.hr_history.iter());
        let avg_power = mean(self.power_history.iter());

        let cardiac_drift_percent = if self.hr_history.len() > DRIFT_MIN_SAMPLES {
            self.drift_percent().unwrap_or(0.0)
        } else {
            0.0
        };

        WorkoutStats {
            avg_hr,
            avg_power,
            avg_cadence: mean(self.cadence_history.iter()),
            seconds_in_zone: self.seconds_in_zone,
            seconds_above: self.seconds_above,
            seconds_below: self.seconds_below,
            efficiency_factor: if avg_hr > 0.0 { avg_power / avg_hr } else { 0.0 },
            cardiac_drift_percent,
        }
    }

    /// Classify `hr` against the active zone.
    pub fn zone_status(&self, hr: u16) -> ZoneStatus {
        self.config.zone.status(hr)
    }

    /// Clear all history, timers and cooldowns for a new session.
    pub fn reset(&mut self) {
        self.hr_history.clear();
        self.power_history.clear();
        self.cadence_history.clear();
        self.out_of_zone_since = None;
        self.cooldowns.clear();
        self.seconds_in_zone = 0.0;
        self.seconds_above = 0.0;
        self.seconds_below = 0.0;
        self.last_update = None;
        tracing::debug!("Zone analyzer reset");
    }

    /// Change zone bounds; affects later updates only.
    pub fn update_zones(&mut self, low: u16, high: u16) {
        self.config.zone = HeartRateZone::new(low, high);
        tracing::info!("Analyzer zone set to {}-{} bpm", low, high);
    }
}

impl Default for ZoneAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
