//! Training quality alerts and their cooldown bookkeeping.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of training quality alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Heart rate above the zone for too long
    HrHigh,
    /// Heart rate below the zone for too long
    HrLow,
    /// Efficiency dropped between the two halves of the session
    CardiacDrift,
    /// Power fell while heart rate held
    Decoupling,
}

impl AlertKind {
    /// Every kind, in cooldown slot order.
    pub const ALL: [AlertKind; 4] = [
        AlertKind::HrHigh,
        AlertKind::HrLow,
        AlertKind::CardiacDrift,
        AlertKind::Decoupling,
    ];

    fn slot(self) -> usize {
        match self {
            AlertKind::HrHigh => 0,
            AlertKind::HrLow => 1,
            AlertKind::CardiacDrift => 2,
            AlertKind::Decoupling => 3,
        }
    }

    /// Stable identifier used on the event stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HrHigh => "hr_high",
            AlertKind::HrLow => "hr_low",
            AlertKind::CardiacDrift => "cardiac_drift",
            AlertKind::Decoupling => "decoupling",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// An alert raised by the zone analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// Human readable message
    pub message: String,
    pub severity: Severity,
    /// When the alert fired
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }
}

/// Last-fired time per alert kind.
#[derive(Debug, Clone)]
pub struct AlertCooldowns {
    last_fired: [Option<Instant>; 4],
    cooldown: Duration,
}

impl AlertCooldowns {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_fired: [None; 4],
            cooldown,
        }
    }

    /// A kind may fire if it never fired or its cooldown has strictly elapsed.
    pub fn ready(&self, kind: AlertKind, now: Instant) -> bool {
        match self.last_fired[kind.slot()] {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        }
    }

    /// Record that `kind` fired at `now`.
    pub fn mark(&mut self, kind: AlertKind, now: Instant) {
        self.last_fired[kind.slot()] = Some(now);
    }

    /// When `kind` last fired.
    pub fn last_fired(&self, kind: AlertKind) -> Option<Instant> {
        self.last_fired[kind.slot()]
    }

    /// Forget every kind.
    pub fn clear(&mut self) {
        self.last_fired = [None; 4];
    }
}
