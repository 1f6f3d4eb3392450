// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared fixtures for the integration tests: a small message-definition
//! database and wire-frame builders that mirror the OEM formats.

#![allow(dead_code)]

use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};

use oemcodec::core::crc::{crc32_block, nmea_checksum};
use oemcodec::{MeasurementSource, MessageDatabase, TimeStatus};

/// Message database used across the integration tests.
pub const TEST_DB: &str = r#"{
    "enums": [
        {"name": "SolStatus", "values": [
            {"name": "SOL_COMPUTED", "value": 0},
            {"name": "INSUFFICIENT_OBS", "value": 1}
        ]},
        {"name": "PosType", "values": [
            {"name": "NONE", "value": 0},
            {"name": "SINGLE", "value": 16},
            {"name": "NARROW_INT", "value": 50}
        ]}
    ],
    "messages": [
        {"name": "BESTPOS", "id": 42, "fields": [
            {"name": "solution_status", "type": "enum", "enum": "SolStatus"},
            {"name": "position_type", "type": "enum", "enum": "PosType"},
            {"name": "latitude", "type": "double"},
            {"name": "longitude", "type": "double"},
            {"name": "height", "type": "double"},
            {"name": "num_sats", "type": "uchar"}
        ]},
        {"name": "TIME", "id": 101, "fields": [
            {"name": "clock_status", "type": "ulong"},
            {"name": "offset", "type": "double"}
        ]},
        {"name": "RANGECMP", "id": 140, "fields": [
            {"name": "records", "type": "struct", "array": {"variable": 325},
             "fields": [{"name": "data", "type": "hexbyte", "array": {"fixed": 24}}]}
        ]},
        {"name": "RANGE", "id": 43, "fields": [
            {"name": "obs", "type": "struct", "array": {"variable": 325}, "fields": [
                {"name": "prn", "type": "ushort"},
                {"name": "glofreq", "type": "short"},
                {"name": "psr", "type": "double"},
                {"name": "psr_std", "type": "float"},
                {"name": "adr", "type": "double"},
                {"name": "adr_std", "type": "float"},
                {"name": "dopp", "type": "float"},
                {"name": "cno", "type": "float"},
                {"name": "locktime", "type": "float"},
                {"name": "ch_tr_status", "type": "ulong"}
            ]}
        ]}
    ]
}"#;

pub fn test_db() -> Arc<MessageDatabase> {
    Arc::new(MessageDatabase::from_str(TEST_DB).unwrap())
}

/// Fields every test header shares.
pub struct HeaderFields {
    pub message_id: u16,
    pub week: u16,
    pub milliseconds: u32,
    pub time_status: TimeStatus,
    pub definition_crc16: u16,
}

impl HeaderFields {
    pub fn new(message_id: u16) -> Self {
        Self {
            message_id,
            week: 2215,
            milliseconds: 148_248_000,
            time_status: TimeStatus::FineSteering,
            definition_crc16: 0,
        }
    }

    pub fn with_definition_crc(mut self, db: &MessageDatabase, name: &str) -> Self {
        let def = db
            .get_by_name(name, oemcodec::HeaderFormat::Binary, MeasurementSource::Primary)
            .unwrap();
        self.definition_crc16 = (def.latest().def_crc & 0xFFFF) as u16;
        self
    }

    pub fn with_time(mut self, week: u16, milliseconds: u32) -> Self {
        self.week = week;
        self.milliseconds = milliseconds;
        self
    }
}

/// Build a CRC-valid long binary frame.
pub fn binary_frame(header: &HeaderFields, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xAA, 0x44, 0x12, 28]);
    frame.write_u16::<LittleEndian>(header.message_id).unwrap();
    frame.push(0); // message type: primary, not a response
    frame.push(0x20); // COM1
    frame.write_u16::<LittleEndian>(body.len() as u16).unwrap();
    frame.write_u16::<LittleEndian>(0).unwrap(); // sequence
    frame.push(144); // idle time, 72.0%
    frame.push(header.time_status.raw());
    frame.write_u16::<LittleEndian>(header.week).unwrap();
    frame.write_u32::<LittleEndian>(header.milliseconds).unwrap();
    frame.write_u32::<LittleEndian>(0x0200_0020).unwrap();
    frame.write_u16::<LittleEndian>(header.definition_crc16).unwrap();
    frame.write_u16::<LittleEndian>(32768).unwrap();
    frame.extend_from_slice(body);
    let crc = crc32_block(0, &frame);
    frame.write_u32::<LittleEndian>(crc).unwrap();
    frame
}

/// Build a CRC-valid framed ASCII message from its header+body text.
pub fn ascii_frame(text: &str) -> Vec<u8> {
    let crc = crc32_block(0, text.as_bytes());
    format!("#{text}*{crc:08x}\r\n").into_bytes()
}

/// Build a checksum-valid NMEA sentence.
pub fn nmea_frame(sentence: &str) -> Vec<u8> {
    let ck = nmea_checksum(sentence.as_bytes());
    format!("${sentence}*{ck:02x}\r\n").into_bytes()
}

/// Body of a BESTPOS log: SOL_COMPUTED, SINGLE, fixed coordinates, 30 sats.
pub fn bestpos_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(0).unwrap(); // SOL_COMPUTED
    body.write_u32::<LittleEndian>(16).unwrap(); // SINGLE
    body.write_f64::<LittleEndian>(51.11636937989).unwrap();
    body.write_f64::<LittleEndian>(-114.03825348307).unwrap();
    body.write_f64::<LittleEndian>(1064.533).unwrap();
    body.push(30);
    body
}

/// Write `len` bits of `value` at `start`, LSB-first.
fn pack_bits(data: &mut [u8], start: usize, len: usize, value: u64) {
    for i in 0..len {
        let bit = start + i;
        if (value >> i) & 1 != 0 {
            data[bit / 8] |= 1 << (bit % 8);
        }
    }
}

/// One compressed RANGECMP observation record.
pub fn rangecmp_record(prn: u16) -> Vec<u8> {
    let mut record = vec![0u8; 24];
    pack_bits(&mut record, 0, 32, 0x0002_1234); // channel tracking status
    pack_bits(&mut record, 32, 28, ((-1200.5f64 * 256.0) as i64 as u64) & 0x0FFF_FFFF);
    pack_bits(&mut record, 60, 36, (21_336_489.25f64 * 128.0) as u64);
    pack_bits(&mut record, 96, 32, ((54_321.5f64 * 256.0) as i64 as u64) & 0xFFFF_FFFF);
    pack_bits(&mut record, 128, 4, 3);
    pack_bits(&mut record, 132, 4, 7);
    pack_bits(&mut record, 136, 8, prn as u64);
    pack_bits(&mut record, 144, 21, (512.5f64 * 32.0) as u64);
    pack_bits(&mut record, 165, 5, 25); // C/N0 45 dB-Hz
    pack_bits(&mut record, 170, 8, 5);
    record
}

/// Body of a RANGECMP log carrying the given observation records.
pub fn rangecmp_body(records: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(records.len() as u32).unwrap();
    for record in records {
        body.extend_from_slice(record);
    }
    body
}
