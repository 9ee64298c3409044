//! Unit tests for the FIT activity encoder.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fitparser::profile::MesgNum;
use fitparser::Value;
use zoneride::recording::exporter_fit::{calculate_crc, encode_activity, fit_timestamp};
use zoneride::recording::types::{ActivitySummary, ExportError, SessionRecord};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
}

fn ride(seconds: i64) -> Vec<SessionRecord> {
    (0..seconds)
        .map(|i| {
            SessionRecord::new(
                start() + Duration::seconds(i),
                128 + (i % 10) as u16,
                140 + (i % 5) as u16,
                88,
                8.0,
            )
        })
        .collect()
}

#[test]
fn test_trailing_crc_matches_contents() {
    let data = encode_activity(&ride(120)).unwrap();
    let (body, trailer) = data.split_at(data.len() - 2);

    let stored = u16::from_le_bytes([trailer[0], trailer[1]]);
    assert_eq!(calculate_crc(body), stored);

    let header_crc = u16::from_le_bytes([data[12], data[13]]);
    assert_eq!(calculate_crc(&data[0..12]), header_crc);
}

#[test]
fn test_data_size_excludes_header_and_crc() {
    let data = encode_activity(&ride(10)).unwrap();
    let data_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

    assert_eq!(data_size, data.len() - 14 - 2);
}

#[test]
fn test_independent_decoder_reads_every_record() {
    let records = ride(60);
    let data = encode_activity(&records).unwrap();

    let messages = fitparser::from_bytes(&data).expect("valid FIT file");
    let decoded: Vec<_> = messages
        .iter()
        .filter(|m| m.kind() == MesgNum::Record)
        .collect();
    assert_eq!(decoded.len(), records.len());

    let heart_rate = decoded[3]
        .fields()
        .iter()
        .find(|f| f.name() == "heart_rate")
        .map(|f| f.value().clone());
    assert_eq!(heart_rate, Some(Value::UInt8(131)));

    for kind in [
        MesgNum::FileId,
        MesgNum::Event,
        MesgNum::Lap,
        MesgNum::Session,
        MesgNum::Activity,
    ] {
        assert!(
            messages.iter().any(|m| m.kind() == kind),
            "missing {:?}",
            kind
        );
    }
}

#[test]
fn test_zero_records_is_an_error() {
    assert!(matches!(encode_activity(&[]), Err(ExportError::NoData)));
}

#[test]
fn test_summary_matches_records() {
    let summary = ActivitySummary::from_records(&ride(60)).unwrap();

    assert_eq!(summary.elapsed_ms, 59_000);
    assert_eq!(summary.max_heart_rate, 137);
    assert_eq!(summary.avg_heart_rate, 132);
    assert_eq!(summary.avg_power, 142);
    assert!((summary.distance_meters - 472.0).abs() < 1e-6);
}

#[test]
fn test_timestamps_are_fit_epoch_seconds() {
    let epoch = Utc.with_ymd_and_hms(1989, 12, 31, 0, 0, 0).unwrap();
    assert_eq!(fit_timestamp(epoch), 0);
    assert_eq!(fit_timestamp(epoch + Duration::seconds(86_400)), 86_400);
    assert_eq!(fit_timestamp(DateTime::<Utc>::UNIX_EPOCH), 0);
}
