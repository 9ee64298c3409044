//! Session recorder.
//!
//! Append-only record log with periodic crash-safe JSON snapshots and FIT
//! export. The first record opens the session; every later record moves its
//! end time forward.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::recording::exporter_fit::encode_activity;
use crate::recording::types::{
    RecorderConfig, RecorderError, SessionRecord, SessionSnapshot,
};

/// Records session samples and exports them as an activity file.
pub struct SessionRecorder {
    /// Configuration
    config: RecorderConfig,
    /// Recorded samples, in arrival order
    records: Vec<SessionRecord>,
    /// Timestamp of the first record
    start_time: Option<DateTime<Utc>>,
    /// Timestamp of the latest record
    end_time: Option<DateTime<Utc>>,
    /// Snapshot file for the open session
    snapshot_path: Option<PathBuf>,
    /// Record count at the last snapshot
    last_snapshot_count: usize,
}

impl SessionRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            start_time: None,
            end_time: None,
            snapshot_path: None,
            last_snapshot_count: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RecorderConfig::default())
    }

    /// Append a record.
    ///
    /// Writes a snapshot once enough records accumulated since the last one.
    /// Snapshot failures are logged and never interrupt recording.
    pub fn add_record(&mut self, record: SessionRecord) {
        if self.start_time.is_none() {
            self.start_time = Some(record.timestamp);
            let name = format!(".backup_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
            self.snapshot_path = Some(self.config.backup_dir.join(name));
            tracing::info!("Recording session started");
        }

        self.end_time = Some(record.timestamp);
        self.records.push(record);

        if self.records.len() - self.last_snapshot_count >= self.config.snapshot_every_records {
            if let Err(e) = self.write_snapshot() {
                tracing::error!("Snapshot save failed: {}", e);
            }
        }
    }

    fn write_snapshot(&mut self) -> Result<(), RecorderError> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };

        std::fs::create_dir_all(&self.config.backup_dir)?;
        let json = serde_json::to_string(&self.snapshot())?;
        std::fs::write(path, json)?;

        self.last_snapshot_count = self.records.len();
        tracing::debug!(
            "Snapshot saved: {} records to {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    /// Current contents as a snapshot value.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            start_time: self.start_time,
            end_time: self.end_time,
            records: self.records.clone(),
        }
    }

    /// Restore the log from a snapshot file, replacing current contents.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), RecorderError> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&json)?;

        self.start_time = snapshot.start_time;
        self.end_time = snapshot.end_time;
        self.records = snapshot.records;
        self.snapshot_path = Some(path.to_path_buf());
        self.last_snapshot_count = self.records.len();

        tracing::info!(
            "Recovered {} records from {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    /// Encode the session as a FIT file.
    pub fn finalize(&self) -> Result<Vec<u8>, RecorderError> {
        if self.records.is_empty() {
            return Err(RecorderError::NoData);
        }
        let data = encode_activity(&self.records)?;
        tracing::info!("Finalized session with {} records", self.records.len());
        Ok(data)
    }

    /// Write the FIT file into `dir` and remove the snapshot.
    ///
    /// Returns the path of the written file.
    pub fn export_to_file(&mut self, dir: &Path) -> Result<PathBuf, RecorderError> {
        let data = self.finalize()?;

        std::fs::create_dir_all(dir)?;
        let filename = format!("zone2_ride_{}.fit", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        std::fs::write(&path, data)?;

        self.remove_snapshot();
        tracing::info!("Workout saved to {}", path.display());
        Ok(path)
    }

    fn remove_snapshot(&mut self) {
        if let Some(path) = self.snapshot_path.take() {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("Failed to remove snapshot {}: {}", path.display(), e);
                }
            }
        }
        self.last_snapshot_count = 0;
    }

    /// Discard all records and any pending snapshot.
    pub fn clear(&mut self) {
        self.records.clear();
        self.start_time = None;
        self.end_time = None;
        self.remove_snapshot();
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Path of the pending snapshot, if a session is open.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Seconds between first and latest record.
    pub fn duration_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }
}
