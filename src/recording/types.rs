//! Recording types for session capture and export.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single recorded data point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Wall-clock time of the sample
    pub timestamp: DateTime<Utc>,
    /// Heart rate in BPM
    pub heart_rate: u16,
    /// Power in watts
    pub power: u16,
    /// Cadence in RPM
    pub cadence: u16,
    /// Speed in meters per second
    pub speed_mps: f32,
}

impl SessionRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        heart_rate: u16,
        power: u16,
        cadence: u16,
        speed_mps: f32,
    ) -> Self {
        Self {
            timestamp,
            heart_rate,
            power,
            cadence,
            speed_mps,
        }
    }
}

/// Configuration for the session recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Directory crash-safe snapshots are written to
    pub backup_dir: PathBuf,
    /// Records between snapshots
    pub snapshot_every_records: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("workouts"),
            snapshot_every_records: 30,
        }
    }
}

/// On-disk snapshot of an in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub records: Vec<SessionRecord>,
}

/// Aggregates written into the lap and session messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Wall-clock span in milliseconds
    pub elapsed_ms: u32,
    pub avg_heart_rate: u16,
    pub max_heart_rate: u16,
    pub avg_cadence: u16,
    pub max_cadence: u16,
    pub avg_power: u16,
    pub max_power: u16,
    /// Distance integrated from speed, in meters
    pub distance_meters: f64,
}

impl ActivitySummary {
    /// Summarize `records`, or `None` when empty.
    ///
    /// Averages truncate toward zero.
    pub fn from_records(records: &[SessionRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;
        let count = records.len() as u64;

        let avg = |field: fn(&SessionRecord) -> u16| {
            (records.iter().map(|r| field(r) as u64).sum::<u64>() / count) as u16
        };
        let max = |field: fn(&SessionRecord) -> u16| {
            records.iter().map(field).max().unwrap_or(0)
        };

        let distance_meters = records
            .windows(2)
            .map(|pair| {
                let dt = (pair[1].timestamp - pair[0].timestamp).num_milliseconds().max(0);
                pair[1].speed_mps.max(0.0) as f64 * dt as f64 / 1000.0
            })
            .sum();

        let elapsed_ms = (last.timestamp - first.timestamp)
            .num_milliseconds()
            .clamp(0, u32::MAX as i64) as u32;

        Some(Self {
            start_time: first.timestamp,
            end_time: last.timestamp,
            elapsed_ms,
            avg_heart_rate: avg(|r| r.heart_rate),
            max_heart_rate: max(|r| r.heart_rate),
            avg_cadence: avg(|r| r.cadence),
            max_cadence: max(|r| r.cadence),
            avg_power: avg(|r| r.power),
            max_power: max(|r| r.power),
            distance_meters,
        })
    }
}

/// Errors from the session recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Nothing recorded
    #[error("No records to export")]
    NoData,

    /// Encoding failed
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    /// Snapshot could not be (de)serialized
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File system error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors during activity file encoding.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to encode
    #[error("Session has no data to export")]
    NoData,

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
