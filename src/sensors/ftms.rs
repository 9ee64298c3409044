//! FTMS (Fitness Machine Service) wire protocol.
//!
//! Decoders for Indoor Bike Data, Cycling Power Measurement and Heart Rate
//! Measurement notifications, plus encoders for the Fitness Machine Control
//! Point. Every decoder is total: short frames decode partially and never
//! index past the end of the payload.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sensors::types::{BikeSample, HrSample};

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Service UUID (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1818_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Measurement UUID (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Service UUID (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data flags (first 2 bytes).
///
/// Only the fields that precede instantaneous power are tracked; anything
/// after power is never read.
#[derive(Debug, Clone, Copy, Default)]
struct IndoorBikeDataFlags {
    /// More data follows in another frame, instantaneous speed omitted (bit 0)
    more_data: bool,
    /// Average speed present (bit 1)
    avg_speed_present: bool,
    /// Instantaneous cadence present (bit 2)
    inst_cadence_present: bool,
    /// Average cadence present (bit 3)
    avg_cadence_present: bool,
    /// Total distance present (bit 4)
    total_distance_present: bool,
    /// Resistance level present (bit 5)
    resistance_level_present: bool,
    /// Instantaneous power present (bit 6)
    inst_power_present: bool,
}

impl IndoorBikeDataFlags {
    fn from_bits(flags: u16) -> Self {
        Self {
            more_data: (flags & 0x0001) != 0,
            avg_speed_present: (flags & 0x0002) != 0,
            inst_cadence_present: (flags & 0x0004) != 0,
            avg_cadence_present: (flags & 0x0008) != 0,
            total_distance_present: (flags & 0x0010) != 0,
            resistance_level_present: (flags & 0x0020) != 0,
            inst_power_present: (flags & 0x0040) != 0,
        }
    }
}

/// Bounds-checked little-endian reader over a notification payload.
struct FrameCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameCursor<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    fn skip(&mut self, len: usize) {
        self.offset = self.offset.saturating_add(len);
    }

    fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.offset)?;
        self.offset += 1;
        Some(value)
    }

    fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.data.get(self.offset..self.offset.checked_add(2)?)?;
        self.offset += 2;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_i16(&mut self) -> Option<i16> {
        self.read_u16().map(|raw| raw as i16)
    }
}

/// Decode an Indoor Bike Data notification into a [`BikeSample`].
///
/// Layout after the 16-bit flags, in order: instantaneous speed (unless the
/// "more data" bit is set), average speed, instantaneous cadence, average
/// cadence, total distance (3 bytes), resistance level, instantaneous power.
/// A field whose bytes are missing keeps its zero default.
pub fn decode_indoor_bike_data(data: &[u8], received_at: DateTime<Utc>) -> BikeSample {
    let mut sample = BikeSample {
        timestamp: received_at,
        ..BikeSample::default()
    };

    let mut cursor = FrameCursor::new(data, 0);
    let flags = match cursor.read_u16() {
        Some(bits) => IndoorBikeDataFlags::from_bits(bits),
        // A lone flags byte still gets a well-formed (all default) sample.
        None => IndoorBikeDataFlags::from_bits(data.first().copied().unwrap_or(0) as u16),
    };

    // Speed is in 0.01 km/h units
    if !flags.more_data {
        if let Some(raw) = cursor.read_u16() {
            sample.speed_kmh = raw as f32 / 100.0;
        }
    }

    if flags.avg_speed_present {
        cursor.skip(2);
    }

    // Cadence is in 0.5 RPM units
    if flags.inst_cadence_present {
        if let Some(raw) = cursor.read_u16() {
            sample.cadence_rpm = raw / 2;
        }
    }

    if flags.avg_cadence_present {
        cursor.skip(2);
    }

    if flags.total_distance_present {
        cursor.skip(3);
    }

    if flags.resistance_level_present {
        cursor.skip(2);
    }

    if flags.inst_power_present {
        if let Some(watts) = cursor.read_i16() {
            sample.power_watts = watts.max(0) as u16;
        }
    }

    sample
}

/// Decode the instantaneous power of a Cycling Power Measurement.
///
/// The flags field is ignored; power is the signed 16-bit value at offset 2.
/// Returns `None` when the frame is too short to carry it.
pub fn decode_cycling_power(data: &[u8]) -> Option<i16> {
    FrameCursor::new(data, 2).read_i16()
}

/// Merge a cycling-power reading into the last known bike sample.
///
/// Cadence and speed are left untouched; negative power clamps to zero.
pub fn merge_cycling_power(sample: &mut BikeSample, watts: i16, received_at: DateTime<Utc>) {
    sample.power_watts = watts.max(0) as u16;
    sample.timestamp = received_at;
}

/// Decode a Heart Rate Measurement notification.
///
/// Flag bit 0 selects a 16-bit little-endian value instead of a single byte,
/// both starting at offset 1. A frame without the value decodes to 0 bpm.
pub fn decode_heart_rate(data: &[u8], received_at: DateTime<Utc>) -> HrSample {
    let flags = data.first().copied().unwrap_or(0);
    let mut cursor = FrameCursor::new(data, 1);

    let heart_rate_bpm = if (flags & 0x01) != 0 {
        cursor.read_u16()
    } else {
        cursor.read_u8().map(u16::from)
    };

    HrSample {
        heart_rate_bpm: heart_rate_bpm.unwrap_or(0),
        timestamp: received_at,
    }
}

/// FTMS Control Point opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FtmsControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Reset the fitness machine (drops ERG, back to free ride)
    Reset = 0x01,
    /// Set target power
    SetTargetPower = 0x05,
    /// Start or resume training
    StartOrResume = 0x07,
    /// Stop or pause training
    StopOrPause = 0x08,
}

/// Encode a control point command to request control.
pub fn encode_request_control() -> Vec<u8> {
    vec![FtmsControlOpcode::RequestControl as u8]
}

/// Encode a control point command to reset the trainer.
pub fn encode_reset() -> Vec<u8> {
    vec![FtmsControlOpcode::Reset as u8]
}

/// Encode a control point command to set target power (ERG mode).
///
/// `target_watts` - signed 16-bit watts, written little-endian
pub fn encode_set_target_power(target_watts: i16) -> Vec<u8> {
    let mut cmd = vec![FtmsControlOpcode::SetTargetPower as u8];
    cmd.extend_from_slice(&target_watts.to_le_bytes());
    cmd
}
