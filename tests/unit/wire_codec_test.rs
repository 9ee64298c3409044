//! Unit tests for trainer and heart-rate frame decoding.

use chrono::{TimeZone, Utc};
use zoneride::sensors::control::{ControlCommand, ErgControl};
use zoneride::sensors::ftms::{
    decode_cycling_power, decode_heart_rate, decode_indoor_bike_data, encode_request_control,
    encode_reset, encode_set_target_power, merge_cycling_power,
};
use zoneride::sensors::types::BikeSample;

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
}

#[test]
fn test_power_only_frame() {
    // Flags: 0x0040 (instantaneous power), speed field still present
    let data = [0x40, 0x00, 0x00, 0x00, 0xF0, 0x00];
    let sample = decode_indoor_bike_data(&data, at());

    assert_eq!(sample.power_watts, 240);
    assert_eq!(sample.cadence_rpm, 0);
    assert_eq!(sample.speed_kmh, 0.0);
    assert_eq!(sample.timestamp, at());
}

#[test]
fn test_negative_power_clamps_to_zero() {
    // Power: -25 W
    let raw = (-25i16).to_le_bytes();
    let data = [0x40, 0x00, 0x00, 0x00, raw[0], raw[1]];

    assert_eq!(decode_indoor_bike_data(&data, at()).power_watts, 0);
}

#[test]
fn test_more_data_bit_suppresses_speed() {
    // Flags: 0x0041 (more data + power), no speed field
    let data = [0x41, 0x00, 0xC8, 0x00];
    let sample = decode_indoor_bike_data(&data, at());

    assert_eq!(sample.power_watts, 200);
    assert_eq!(sample.speed_kmh, 0.0);
}

#[test]
fn test_all_optional_fields_are_skipped_in_order() {
    // Flags: 0x007E (avg speed, cadence, avg cadence, distance, resistance, power)
    let data = [
        0x7E, 0x00, // flags
        0xC4, 0x09, // speed 25.00 km/h
        0x00, 0x00, // avg speed
        0xB4, 0x00, // cadence 90 rpm
        0x00, 0x00, // avg cadence
        0x10, 0x27, 0x00, // total distance
        0x05, 0x00, // resistance
        0x2C, 0x01, // power 300 W
    ];
    let sample = decode_indoor_bike_data(&data, at());

    assert!((sample.speed_kmh - 25.0).abs() < 0.01);
    assert_eq!(sample.cadence_rpm, 90);
    assert_eq!(sample.power_watts, 300);
}

#[test]
fn test_truncated_frame_decodes_partially() {
    // Cadence + power flagged, but the frame ends after cadence
    let data = [0x44, 0x00, 0xD0, 0x07, 0xB4, 0x00];
    let sample = decode_indoor_bike_data(&data, at());

    assert!((sample.speed_kmh - 20.0).abs() < 0.01);
    assert_eq!(sample.cadence_rpm, 90);
    assert_eq!(sample.power_watts, 0);
}

#[test]
fn test_empty_frames_never_panic() {
    assert_eq!(decode_indoor_bike_data(&[], at()).power_watts, 0);
    assert_eq!(decode_heart_rate(&[], at()).heart_rate_bpm, 0);
    assert_eq!(decode_heart_rate(&[0x01], at()).heart_rate_bpm, 0);
    assert_eq!(decode_cycling_power(&[0x00, 0x00, 0x10]), None);
}

#[test]
fn test_heart_rate_width_follows_flag() {
    // 8-bit: only offset 1 is read
    assert_eq!(decode_heart_rate(&[0x00, 0x91, 0x01], at()).heart_rate_bpm, 145);
    // 16-bit LE at offset 1
    assert_eq!(decode_heart_rate(&[0x01, 0x2C, 0x01], at()).heart_rate_bpm, 300);
}

#[test]
fn test_cycling_power_merges_without_touching_cadence() {
    let mut sample = BikeSample {
        power_watts: 180,
        cadence_rpm: 92,
        speed_kmh: 31.5,
        ..BikeSample::default()
    };

    let watts = decode_cycling_power(&[0x00, 0x00, 0xD2, 0x00]).unwrap();
    merge_cycling_power(&mut sample, watts, at());

    assert_eq!(sample.power_watts, 210);
    assert_eq!(sample.cadence_rpm, 92);
    assert!((sample.speed_kmh - 31.5).abs() < f32::EPSILON);
    assert_eq!(sample.timestamp, at());
}

#[test]
fn test_control_point_encoding() {
    assert_eq!(encode_request_control(), vec![0x00]);
    assert_eq!(encode_reset(), vec![0x01]);
    assert_eq!(encode_set_target_power(250), vec![0x05, 0xFA, 0x00]);
    assert_eq!(encode_set_target_power(-1), vec![0x05, 0xFF, 0xFF]);
}

#[test]
fn test_erg_sequence_after_reconnect() {
    let mut erg = ErgControl::new();
    for command in erg.plan_connect() {
        erg.confirm(command);
    }
    for command in erg.plan_set_target_power(180) {
        erg.confirm(command);
    }
    assert!(erg.erg_active());
    assert_eq!(erg.target_power(), Some(180));

    // A dropped connection forgets control; the next target asks again
    erg.clear();
    assert_eq!(
        erg.plan_set_target_power(150),
        vec![
            ControlCommand::RequestControl,
            ControlCommand::SetTargetPower(150)
        ]
    );
}
