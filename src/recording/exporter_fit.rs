//! FIT activity file encoder.
//!
//! Writes the subset of the FIT binary format needed for an importable indoor
//! ride: file header, file id, timer events, one record per sample, lap,
//! session and activity summaries, and the trailing CRC.

use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};

use crate::recording::types::{ActivitySummary, ExportError, SessionRecord};

/// FIT epoch offset: FIT timestamps are seconds since 1989-12-31 00:00:00 UTC
pub const FIT_EPOCH_OFFSET: i64 = 631065600;

/// FIT file header size
const FIT_HEADER_SIZE: u8 = 14;

/// FIT protocol version
const FIT_PROTOCOL_VERSION: u8 = 0x20; // 2.0

/// FIT profile version
const FIT_PROFILE_VERSION: u16 = 0x0814;

/// FIT global message numbers
mod message_type {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const ACTIVITY: u16 = 34;
}

/// Local message numbers, one per global message used
mod local_type {
    pub const FILE_ID: u8 = 0;
    pub const RECORD: u8 = 1;
    pub const EVENT: u8 = 2;
    pub const LAP: u8 = 3;
    pub const SESSION: u8 = 4;
    pub const ACTIVITY: u8 = 5;
}

/// FIT field numbers shared across messages
mod field_type {
    pub const TIMESTAMP: u8 = 253;
    pub const HEART_RATE: u8 = 3;
    pub const CADENCE: u8 = 4;
    pub const SPEED: u8 = 6;
    pub const POWER: u8 = 7;
}

/// FIT base types
mod base_type {
    pub const ENUM: u8 = 0x00;
    pub const UINT8: u8 = 0x02;
    pub const UINT16: u8 = 0x84;
    pub const UINT32: u8 = 0x86;
    pub const UINT32Z: u8 = 0x8C;
}

/// Event codes
mod event {
    pub const TIMER: u8 = 0;
    pub const SESSION: u8 = 8;
    pub const LAP: u8 = 9;
    pub const ACTIVITY: u8 = 26;
}

/// Event types
mod event_type {
    pub const START: u8 = 0;
    pub const STOP: u8 = 1;
}

const SPORT_CYCLING: u8 = 2;
const SUB_SPORT_INDOOR_CYCLING: u8 = 6;
const FILE_TYPE_ACTIVITY: u8 = 4;
const MANUFACTURER_GARMIN: u16 = 1;

/// Calculate the FIT CRC-16 of `data`.
///
/// Table driven, four bits at a time, low nibble first.
pub fn calculate_crc(data: &[u8]) -> u16 {
    const CRC_TABLE: [u16; 16] = [
        0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
        0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
    ];

    data.iter().fold(0u16, |mut crc, byte| {
        for nibble in [byte & 0xF, (byte >> 4) & 0xF] {
            let tmp = CRC_TABLE[(crc & 0xF) as usize];
            crc = (crc >> 4) & 0x0FFF;
            crc = crc ^ tmp ^ CRC_TABLE[nibble as usize];
        }
        crc
    })
}

/// Seconds since the FIT epoch. Times before it clamp to 0.
pub fn fit_timestamp(dt: DateTime<Utc>) -> u32 {
    (dt.timestamp() - FIT_EPOCH_OFFSET).clamp(0, u32::MAX as i64) as u32
}

/// FIT file writer
struct FitWriter {
    buffer: Cursor<Vec<u8>>,
    data_size: u32,
}

impl FitWriter {
    fn new() -> Self {
        Self {
            buffer: Cursor::new(Vec::new()),
            data_size: 0,
        }
    }

    /// Write the header with a zero data size, patched in `finalize`.
    fn write_header(&mut self) -> Result<(), ExportError> {
        let mut header = Vec::with_capacity(FIT_HEADER_SIZE as usize);
        header.push(FIT_HEADER_SIZE);
        header.push(FIT_PROTOCOL_VERSION);
        header.extend_from_slice(&FIT_PROFILE_VERSION.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(b".FIT");

        self.buffer.write_all(&header)?;
        // Header CRC is written against the final data size in `finalize`
        self.buffer.write_all(&0u16.to_le_bytes())?;
        Ok(())
    }

    /// Write a definition message
    fn write_definition(
        &mut self,
        local_mesg_num: u8,
        global_mesg_num: u16,
        fields: &[(u8, u8, u8)], // (field_def_num, size, base_type)
    ) -> Result<(), ExportError> {
        // Record header: definition message (bit 6 set), local message num in bits 0-3
        self.write_byte(0x40 | (local_mesg_num & 0x0F))?;
        // Reserved
        self.write_byte(0)?;
        // Architecture: 0 = little endian
        self.write_byte(0)?;
        self.write_u16(global_mesg_num)?;
        self.write_byte(fields.len() as u8)?;

        for (field_num, size, base_type) in fields {
            self.write_byte(*field_num)?;
            self.write_byte(*size)?;
            self.write_byte(*base_type)?;
        }

        Ok(())
    }

    /// Write a data message header
    fn write_data_header(&mut self, local_mesg_num: u8) -> Result<(), ExportError> {
        self.write_byte(local_mesg_num & 0x0F)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), ExportError> {
        self.buffer.write_all(&[value])?;
        self.data_size += 1;
        Ok(())
    }

    fn write_u16(&mut self, value: u16) -> Result<(), ExportError> {
        self.buffer.write_all(&value.to_le_bytes())?;
        self.data_size += 2;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<(), ExportError> {
        self.buffer.write_all(&value.to_le_bytes())?;
        self.data_size += 4;
        Ok(())
    }

    fn write_timestamp(&mut self, dt: DateTime<Utc>) -> Result<(), ExportError> {
        self.write_u32(fit_timestamp(dt))
    }

    /// Patch data size and header CRC, then append the file CRC.
    fn finalize(self) -> Vec<u8> {
        let data_size = self.data_size;
        let mut data = self.buffer.into_inner();

        data[4..8].copy_from_slice(&data_size.to_le_bytes());
        let header_crc = calculate_crc(&data[0..12]);
        data[12..14].copy_from_slice(&header_crc.to_le_bytes());

        let file_crc = calculate_crc(&data);
        data.extend_from_slice(&file_crc.to_le_bytes());
        data
    }
}

/// Encode `records` as a FIT activity file.
pub fn encode_activity(records: &[SessionRecord]) -> Result<Vec<u8>, ExportError> {
    let summary = ActivitySummary::from_records(records).ok_or(ExportError::NoData)?;

    let mut writer = FitWriter::new();
    writer.write_header()?;

    write_file_id(&mut writer, &summary)?;
    write_event(&mut writer, summary.start_time, event_type::START)?;
    write_records(&mut writer, records)?;
    write_event(&mut writer, summary.end_time, event_type::STOP)?;
    write_lap(&mut writer, &summary)?;
    write_session(&mut writer, &summary)?;
    write_activity(&mut writer, &summary)?;

    let data = writer.finalize();
    tracing::debug!(
        "Encoded FIT activity: {} records, {} bytes",
        records.len(),
        data.len()
    );
    Ok(data)
}

fn write_file_id(writer: &mut FitWriter, summary: &ActivitySummary) -> Result<(), ExportError> {
    let fields = [
        (0, 1, base_type::ENUM),    // type
        (1, 2, base_type::UINT16),  // manufacturer
        (2, 2, base_type::UINT16),  // product
        (3, 4, base_type::UINT32Z), // serial_number
        (4, 4, base_type::UINT32),  // time_created
    ];
    writer.write_definition(local_type::FILE_ID, message_type::FILE_ID, &fields)?;

    writer.write_data_header(local_type::FILE_ID)?;
    writer.write_byte(FILE_TYPE_ACTIVITY)?;
    writer.write_u16(MANUFACTURER_GARMIN)?;
    writer.write_u16(1)?;
    writer.write_u32(12345)?;
    writer.write_timestamp(summary.start_time)?;

    Ok(())
}

fn write_event(
    writer: &mut FitWriter,
    timestamp: DateTime<Utc>,
    kind: u8,
) -> Result<(), ExportError> {
    let fields = [
        (field_type::TIMESTAMP, 4, base_type::UINT32),
        (0, 1, base_type::ENUM), // event
        (1, 1, base_type::ENUM), // event_type
    ];
    writer.write_definition(local_type::EVENT, message_type::EVENT, &fields)?;

    writer.write_data_header(local_type::EVENT)?;
    writer.write_timestamp(timestamp)?;
    writer.write_byte(event::TIMER)?;
    writer.write_byte(kind)?;

    Ok(())
}

fn write_records(writer: &mut FitWriter, records: &[SessionRecord]) -> Result<(), ExportError> {
    let fields = [
        (field_type::TIMESTAMP, 4, base_type::UINT32),
        (field_type::HEART_RATE, 1, base_type::UINT8),
        (field_type::CADENCE, 1, base_type::UINT8),
        (field_type::POWER, 2, base_type::UINT16),
        (field_type::SPEED, 2, base_type::UINT16), // mm/s
    ];
    writer.write_definition(local_type::RECORD, message_type::RECORD, &fields)?;

    for record in records {
        writer.write_data_header(local_type::RECORD)?;
        writer.write_timestamp(record.timestamp)?;
        writer.write_byte(record.heart_rate.min(255) as u8)?;
        writer.write_byte(record.cadence.min(255) as u8)?;
        writer.write_u16(record.power)?;
        writer.write_u16(speed_mm_per_sec(record.speed_mps))?;
    }

    Ok(())
}

/// m/s to the record speed field, saturating at the u16 range.
fn speed_mm_per_sec(speed_mps: f32) -> u16 {
    (speed_mps.max(0.0) * 1000.0).min(u16::MAX as f32) as u16
}

fn write_lap(writer: &mut FitWriter, summary: &ActivitySummary) -> Result<(), ExportError> {
    let fields = [
        (field_type::TIMESTAMP, 4, base_type::UINT32),
        (0, 1, base_type::ENUM),    // event
        (1, 1, base_type::ENUM),    // event_type
        (2, 4, base_type::UINT32),  // start_time
        (7, 4, base_type::UINT32),  // total_elapsed_time (ms)
        (8, 4, base_type::UINT32),  // total_timer_time (ms)
        (9, 4, base_type::UINT32),  // total_distance (cm)
        (15, 1, base_type::UINT8),  // avg_heart_rate
        (16, 1, base_type::UINT8),  // max_heart_rate
        (17, 1, base_type::UINT8),  // avg_cadence
        (19, 2, base_type::UINT16), // avg_power
        (20, 2, base_type::UINT16), // max_power
        (25, 1, base_type::ENUM),   // sport
    ];
    writer.write_definition(local_type::LAP, message_type::LAP, &fields)?;

    writer.write_data_header(local_type::LAP)?;
    writer.write_timestamp(summary.end_time)?;
    writer.write_byte(event::LAP)?;
    writer.write_byte(event_type::STOP)?;
    writer.write_timestamp(summary.start_time)?;
    writer.write_u32(summary.elapsed_ms)?;
    writer.write_u32(summary.elapsed_ms)?;
    writer.write_u32(distance_cm(summary.distance_meters))?;
    writer.write_byte(summary.avg_heart_rate.min(255) as u8)?;
    writer.write_byte(summary.max_heart_rate.min(255) as u8)?;
    writer.write_byte(summary.avg_cadence.min(255) as u8)?;
    writer.write_u16(summary.avg_power)?;
    writer.write_u16(summary.max_power)?;
    writer.write_byte(SPORT_CYCLING)?;

    Ok(())
}

fn write_session(writer: &mut FitWriter, summary: &ActivitySummary) -> Result<(), ExportError> {
    let fields = [
        (field_type::TIMESTAMP, 4, base_type::UINT32),
        (0, 1, base_type::ENUM),    // event
        (1, 1, base_type::ENUM),    // event_type
        (2, 4, base_type::UINT32),  // start_time
        (5, 1, base_type::ENUM),    // sport
        (6, 1, base_type::ENUM),    // sub_sport
        (7, 4, base_type::UINT32),  // total_elapsed_time (ms)
        (8, 4, base_type::UINT32),  // total_timer_time (ms)
        (9, 4, base_type::UINT32),  // total_distance (cm)
        (16, 1, base_type::UINT8),  // avg_heart_rate
        (17, 1, base_type::UINT8),  // max_heart_rate
        (18, 1, base_type::UINT8),  // avg_cadence
        (20, 2, base_type::UINT16), // avg_power
        (21, 2, base_type::UINT16), // max_power
        (25, 2, base_type::UINT16), // first_lap_index
        (26, 2, base_type::UINT16), // num_laps
    ];
    writer.write_definition(local_type::SESSION, message_type::SESSION, &fields)?;

    writer.write_data_header(local_type::SESSION)?;
    writer.write_timestamp(summary.end_time)?;
    writer.write_byte(event::SESSION)?;
    writer.write_byte(event_type::STOP)?;
    writer.write_timestamp(summary.start_time)?;
    writer.write_byte(SPORT_CYCLING)?;
    writer.write_byte(SUB_SPORT_INDOOR_CYCLING)?;
    writer.write_u32(summary.elapsed_ms)?;
    writer.write_u32(summary.elapsed_ms)?;
    writer.write_u32(distance_cm(summary.distance_meters))?;
    writer.write_byte(summary.avg_heart_rate.min(255) as u8)?;
    writer.write_byte(summary.max_heart_rate.min(255) as u8)?;
    writer.write_byte(summary.avg_cadence.min(255) as u8)?;
    writer.write_u16(summary.avg_power)?;
    writer.write_u16(summary.max_power)?;
    writer.write_u16(0)?;
    writer.write_u16(1)?;

    Ok(())
}

fn write_activity(writer: &mut FitWriter, summary: &ActivitySummary) -> Result<(), ExportError> {
    let fields = [
        (field_type::TIMESTAMP, 4, base_type::UINT32),
        (0, 4, base_type::UINT32), // total_timer_time (ms)
        (1, 2, base_type::UINT16), // num_sessions
        (2, 1, base_type::ENUM),   // type (manual)
        (3, 1, base_type::ENUM),   // event
        (4, 1, base_type::ENUM),   // event_type
    ];
    writer.write_definition(local_type::ACTIVITY, message_type::ACTIVITY, &fields)?;

    writer.write_data_header(local_type::ACTIVITY)?;
    writer.write_timestamp(summary.end_time)?;
    writer.write_u32(summary.elapsed_ms)?;
    writer.write_u16(1)?;
    writer.write_byte(0)?;
    writer.write_byte(event::ACTIVITY)?;
    writer.write_byte(event_type::STOP)?;

    Ok(())
}

fn distance_cm(meters: f64) -> u32 {
    (meters.max(0.0) * 100.0).min(u32::MAX as f64) as u32
}
