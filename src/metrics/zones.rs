//! Heart rate zone bounds and classification.

use serde::{Deserialize, Serialize};

/// Inclusive heart rate band in BPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateZone {
    /// Lower bound (inclusive)
    pub low: u16,
    /// Upper bound (inclusive)
    pub high: u16,
}

impl Default for HeartRateZone {
    fn default() -> Self {
        Self::new(126, 140)
    }
}

impl HeartRateZone {
    pub const fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    /// Whether `hr` lies within the band.
    pub fn contains(&self, hr: u16) -> bool {
        self.low <= hr && hr <= self.high
    }

    /// Integer midpoint, the HR target for adaptive control.
    pub fn midpoint(&self) -> u16 {
        ((self.low as u32 + self.high as u32) / 2) as u16
    }

    /// Classify a reading against the band.
    pub fn status(&self, hr: u16) -> ZoneStatus {
        if hr < self.low {
            ZoneStatus::Below
        } else if hr > self.high {
            ZoneStatus::Above
        } else {
            ZoneStatus::InZone
        }
    }
}

/// Where a heart rate reading falls relative to the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    Below,
    InZone,
    Above,
}

impl ZoneStatus {
    /// Display color hint for the UI.
    pub fn color(&self) -> &'static str {
        match self {
            ZoneStatus::Below => "blue",
            ZoneStatus::InZone => "green",
            ZoneStatus::Above => "red",
        }
    }
}

impl std::fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneStatus::Below => write!(f, "BELOW ZONE 2"),
            ZoneStatus::InZone => write!(f, "IN ZONE 2"),
            ZoneStatus::Above => write!(f, "ABOVE ZONE 2"),
        }
    }
}
