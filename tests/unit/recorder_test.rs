//! Unit tests for session recording, snapshots and export.

use chrono::{DateTime, Duration, TimeZone, Utc};
use zoneride::recording::recorder::SessionRecorder;
use zoneride::recording::types::{RecorderConfig, RecorderError, SessionRecord};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
}

fn recorder(dir: &std::path::Path) -> SessionRecorder {
    SessionRecorder::new(RecorderConfig {
        backup_dir: dir.to_path_buf(),
        snapshot_every_records: 30,
    })
}

fn record(i: i64) -> SessionRecord {
    SessionRecord::new(start() + Duration::seconds(i), 132, 145, 90, 8.3)
}

#[test]
fn test_snapshot_recovers_in_progress_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut original = recorder(dir.path());
    for i in 0..45 {
        original.add_record(record(i));
    }
    let path = original.snapshot_path().unwrap().to_path_buf();

    // Simulated crash: a fresh recorder picks up the last snapshot
    let mut recovered = recorder(dir.path());
    recovered.load_snapshot(&path).unwrap();

    assert_eq!(recovered.record_count(), 30);
    assert_eq!(recovered.start_time(), Some(start()));
    assert_eq!(recovered.end_time(), Some(start() + Duration::seconds(29)));
    assert_eq!(recovered.records()[7], record(7));
}

#[test]
fn test_export_writes_fit_and_drops_snapshot() {
    let backups = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let mut recorder = recorder(backups.path());
    for i in 0..31 {
        recorder.add_record(record(i));
    }
    let snapshot = recorder.snapshot_path().unwrap().to_path_buf();
    assert!(snapshot.exists());

    let path = recorder.export_to_file(output.path()).unwrap();

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("zone2_ride_"));
    assert!(name.ends_with(".fit"));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[8..12], b".FIT");
    assert!(!snapshot.exists());
}

#[test]
fn test_export_without_records_is_distinct_error() {
    let output = tempfile::tempdir().unwrap();
    let mut recorder = recorder(output.path());

    let result = recorder.export_to_file(output.path());
    assert!(matches!(result, Err(RecorderError::NoData)));
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_snapshot_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = recorder(dir.path());

    let result = recorder.load_snapshot(&dir.path().join("nope.json"));
    assert!(matches!(result, Err(RecorderError::IoError(_))));
    assert_eq!(recorder.record_count(), 0);
}
