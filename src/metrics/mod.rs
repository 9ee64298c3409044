//! Metrics module for heart rate zones and training quality analysis.

pub mod alerts;
pub mod analyzer;
pub mod ring;
pub mod zones;

pub use alerts::{Alert, AlertKind, Severity};
pub use analyzer::{AnalyzerConfig, WorkoutStats, ZoneAnalyzer};
pub use ring::RingBuffer;
pub use zones::{HeartRateZone, ZoneStatus};
