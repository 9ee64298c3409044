//! Recording module for session capture and FIT export.

pub mod exporter_fit;
pub mod recorder;
pub mod types;

pub use exporter_fit::{calculate_crc, encode_activity};
pub use recorder::SessionRecorder;
pub use types::{
    ActivitySummary, ExportError, RecorderConfig, RecorderError, SessionRecord, SessionSnapshot,
};
