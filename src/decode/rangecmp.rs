// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! RANGECMP decompression.
//!
//! Expands the 24-byte compressed pseudorange observation records of a
//! decoded RANGECMP message into the field tree of the uncompressed RANGE
//! message, resolved from the database so the encoders can serialize it.

use std::sync::Arc;

use crate::core::{FieldTree, FieldValue, MessageMetadata, NamedField, Result, TranscodeError};
use crate::database::{ArrayKind, MessageDatabase, MessageDefinition};

/// Compressed observation record length.
const RECORD_LENGTH: usize = 24;

/// Pseudorange standard deviation codes, in metres.
const PSR_STD_DEV: [f32; 16] = [
    0.050, 0.075, 0.113, 0.169, 0.253, 0.380, 0.570, 0.854, 1.281, 2.375, 4.750, 9.500, 19.000,
    38.000, 76.000, 152.000,
];

/// Expand a decoded RANGECMP tree into the RANGE tree.
///
/// The metadata keeps the RANGECMP message ID but takes the RANGE name and
/// definition CRC, so the encoder serializes the expanded observations.
pub fn decompress_rangecmp(
    meta: &mut MessageMetadata,
    tree: &FieldTree,
    db: &MessageDatabase,
) -> Result<(FieldTree, Arc<MessageDefinition>)> {
    if meta.message_name != "RANGECMP" {
        return Err(TranscodeError::decompression(format!(
            "no decompressor for '{}'",
            meta.message_name
        )));
    }

    let records = compressed_records(tree)?;

    let range = db
        .get_by_name("RANGE", meta.format, meta.measurement_source)
        .ok_or_else(|| TranscodeError::decompression("RANGE definition missing from database"))?;
    let layout = range.latest();
    let obs_field = layout
        .fields
        .first()
        .ok_or_else(|| TranscodeError::decompression("RANGE definition has no fields"))?;
    if !matches!(obs_field.array_kind()?, ArrayKind::Variable(_)) {
        return Err(TranscodeError::decompression(
            "RANGE observations field is not a variable array",
        ));
    }
    let sub_fields = db.struct_fields(obs_field)?;

    let mut observations = Vec::with_capacity(records.len());
    for record in &records {
        let obs = expand_record(record)?;
        let mut entry = FieldTree::with_capacity(sub_fields.len());
        for field in sub_fields {
            let value = obs.value_for(&field.name).ok_or_else(|| {
                TranscodeError::decompression(format!(
                    "RANGE definition names unexpected field '{}'",
                    field.name
                ))
            })?;
            entry.push(NamedField::new(field.name.clone(), value));
        }
        observations.push(FieldValue::Struct(entry));
    }

    let expanded = vec![NamedField::new(
        obs_field.name.clone(),
        FieldValue::Array(observations),
    )];

    meta.message_name = range.name.clone();
    meta.message_definition_crc = layout.def_crc;

    Ok((expanded, range))
}

/// Pull the raw 24-byte records out of the decoded RANGECMP tree.
fn compressed_records(tree: &FieldTree) -> Result<Vec<Vec<u8>>> {
    let records = tree
        .first()
        .and_then(|f| f.value.as_array())
        .ok_or_else(|| {
            TranscodeError::decompression("RANGECMP tree has no observation array")
        })?;

    records
        .iter()
        .map(|record| {
            let bytes = match record {
                FieldValue::Hex(bytes) => bytes.clone(),
                FieldValue::Struct(fields) => fields
                    .first()
                    .and_then(|f| match &f.value {
                        FieldValue::Hex(bytes) => Some(bytes.clone()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        TranscodeError::decompression("observation record carries no hex data")
                    })?,
                _ => {
                    return Err(TranscodeError::decompression(
                        "observation record carries no hex data",
                    ))
                }
            };
            if bytes.len() != RECORD_LENGTH {
                return Err(TranscodeError::decompression(format!(
                    "observation record is {} bytes, expected {RECORD_LENGTH}",
                    bytes.len()
                )));
            }
            Ok(bytes)
        })
        .collect()
}

/// One expanded observation.
struct Observation {
    channel_status: u32,
    doppler: f32,
    pseudorange: f64,
    psr_std: f32,
    adr: f64,
    adr_std: f32,
    prn: u16,
    locktime: f32,
    cno: f32,
    glofreq: i16,
}

impl Observation {
    /// Map a RANGE field name to its expanded value.
    fn value_for(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "prn" => FieldValue::UInt16(self.prn),
            "glofreq" => FieldValue::Int16(self.glofreq),
            "psr" => FieldValue::Float64(self.pseudorange),
            "psr_std" => FieldValue::Float32(self.psr_std),
            "adr" => FieldValue::Float64(self.adr),
            "adr_std" => FieldValue::Float32(self.adr_std),
            "dopp" => FieldValue::Float32(self.doppler),
            "cno" => FieldValue::Float32(self.cno),
            "locktime" => FieldValue::Float32(self.locktime),
            "ch_tr_status" => FieldValue::UInt32(self.channel_status),
            _ => return None,
        })
    }
}

/// Expand one 24-byte compressed record.
///
/// Bit offsets are LSB-first within the record:
/// status 0..32, doppler 32..60 (1/256 Hz, signed), pseudorange 60..96
/// (1/128 m), ADR 96..128 (1/256 cycle, signed), PSR std code 128..132,
/// ADR std code 132..136, PRN 136..144, lock time 144..165 (1/32 s),
/// C/N0 165..170 (+20 dB-Hz), GLONASS frequency 170..178.
fn expand_record(record: &[u8]) -> Result<Observation> {
    let channel_status = extract_bits(record, 0, 32) as u32;
    let doppler = sign_extend(extract_bits(record, 32, 28), 28) as f32 / 256.0;
    let pseudorange = extract_bits(record, 60, 36) as f64 / 128.0;
    let adr = sign_extend(extract_bits(record, 96, 32), 32) as f64 / 256.0;
    let psr_std = PSR_STD_DEV[extract_bits(record, 128, 4) as usize];
    let adr_std = (extract_bits(record, 132, 4) as f32 + 1.0) / 512.0;
    let prn = extract_bits(record, 136, 8) as u16;
    if prn == 0 {
        return Err(TranscodeError::decompression("observation has PRN 0"));
    }
    let locktime = extract_bits(record, 144, 21) as f32 / 32.0;
    let cno = extract_bits(record, 165, 5) as f32 + 20.0;
    let glofreq = extract_bits(record, 170, 8) as i16;

    Ok(Observation {
        channel_status,
        doppler,
        pseudorange,
        psr_std,
        adr,
        adr_std,
        prn,
        locktime,
        cno,
        glofreq,
    })
}

/// Read `len` bits starting at `start`, LSB-first.
fn extract_bits(data: &[u8], start: usize, len: usize) -> u64 {
    let mut value = 0u64;
    for i in 0..len {
        let bit = start + i;
        if (data[bit / 8] >> (bit % 8)) & 1 != 0 {
            value |= 1 << i;
        }
    }
    value
}

/// Sign-extend a `bits`-wide value.
fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{find_field, HeaderFormat};

    /// Write `len` bits of `value` at `start`, LSB-first.
    fn pack_bits(data: &mut [u8], start: usize, len: usize, value: u64) {
        for i in 0..len {
            let bit = start + i;
            if (value >> i) & 1 != 0 {
                data[bit / 8] |= 1 << (bit % 8);
            }
        }
    }

    fn compress(
        prn: u16,
        doppler: f64,
        pseudorange: f64,
        adr: f64,
        cno: f64,
        locktime: f64,
    ) -> Vec<u8> {
        let mut record = vec![0u8; RECORD_LENGTH];
        pack_bits(&mut record, 0, 32, 0x0002_1234);
        pack_bits(&mut record, 32, 28, ((doppler * 256.0) as i64 as u64) & 0x0FFF_FFFF);
        pack_bits(&mut record, 60, 36, (pseudorange * 128.0) as u64);
        pack_bits(&mut record, 96, 32, ((adr * 256.0) as i64 as u64) & 0xFFFF_FFFF);
        pack_bits(&mut record, 128, 4, 3); // psr std code
        pack_bits(&mut record, 132, 4, 7); // adr std code
        pack_bits(&mut record, 136, 8, prn as u64);
        pack_bits(&mut record, 144, 21, (locktime * 32.0) as u64);
        pack_bits(&mut record, 165, 5, (cno - 20.0) as u64);
        pack_bits(&mut record, 170, 8, 5);
        record
    }

    fn test_db() -> MessageDatabase {
        MessageDatabase::from_str(
            r#"{"messages": [
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
            ]}"#,
        )
        .unwrap()
    }

    fn rangecmp_tree(records: Vec<Vec<u8>>) -> FieldTree {
        let records = records
            .into_iter()
            .map(|data| {
                FieldValue::Struct(vec![NamedField::new("data", FieldValue::Hex(data))])
            })
            .collect();
        vec![NamedField::new("records", FieldValue::Array(records))]
    }

    fn rangecmp_meta() -> MessageMetadata {
        MessageMetadata {
            message_id: 140,
            message_name: "RANGECMP".to_string(),
            format: HeaderFormat::Binary,
            ..Default::default()
        }
    }

    #[test]
    fn test_decompress_single_observation() {
        let db = test_db();
        let tree = rangecmp_tree(vec![compress(
            17,
            -1234.5,
            21_336_489.25,
            -1_234_567.5,
            45.0,
            512.5,
        )]);
        let mut meta = rangecmp_meta();

        let (expanded, def) = decompress_rangecmp(&mut meta, &tree, &db).unwrap();

        assert_eq!(meta.message_name, "RANGE");
        assert_eq!(meta.message_id, 140);
        assert_eq!(def.name, "RANGE");

        let obs = find_field(&expanded, "obs").unwrap().as_array().unwrap();
        assert_eq!(obs.len(), 1);
        let first = obs[0].as_struct().unwrap();
        assert_eq!(find_field(first, "prn"), Some(&FieldValue::UInt16(17)));
        assert_eq!(find_field(first, "dopp"), Some(&FieldValue::Float32(-1234.5)));
        assert_eq!(
            find_field(first, "psr"),
            Some(&FieldValue::Float64(21_336_489.25))
        );
        assert_eq!(
            find_field(first, "adr"),
            Some(&FieldValue::Float64(-1_234_567.5))
        );
        assert_eq!(find_field(first, "cno"), Some(&FieldValue::Float32(45.0)));
        assert_eq!(
            find_field(first, "locktime"),
            Some(&FieldValue::Float32(512.5))
        );
        assert_eq!(
            find_field(first, "psr_std"),
            Some(&FieldValue::Float32(PSR_STD_DEV[3]))
        );
        assert_eq!(
            find_field(first, "adr_std"),
            Some(&FieldValue::Float32(8.0 / 512.0))
        );
        assert_eq!(find_field(first, "glofreq"), Some(&FieldValue::Int16(5)));
        assert_eq!(
            find_field(first, "ch_tr_status"),
            Some(&FieldValue::UInt32(0x0002_1234))
        );
    }

    #[test]
    fn test_decompress_empty_observation_set() {
        let db = test_db();
        let tree = rangecmp_tree(vec![]);
        let mut meta = rangecmp_meta();
        let (expanded, _) = decompress_rangecmp(&mut meta, &tree, &db).unwrap();
        let obs = find_field(&expanded, "obs").unwrap().as_array().unwrap();
        assert!(obs.is_empty());
        assert_eq!(meta.message_name, "RANGE");
    }

    #[test]
    fn test_decompress_rejects_short_record() {
        let db = test_db();
        let tree = rangecmp_tree(vec![vec![0u8; 23]]);
        let mut meta = rangecmp_meta();
        assert!(decompress_rangecmp(&mut meta, &tree, &db).is_err());
    }

    #[test]
    fn test_decompress_rejects_prn_zero() {
        let db = test_db();
        let tree = rangecmp_tree(vec![vec![0u8; 24]]);
        let mut meta = rangecmp_meta();
        assert!(decompress_rangecmp(&mut meta, &tree, &db).is_err());
    }

    #[test]
    fn test_decompress_requires_range_definition() {
        let db = MessageDatabase::from_str(
            r#"{"messages": [{"name": "RANGECMP", "id": 140, "fields": [
                {"name": "records", "type": "struct", "array": {"variable": 325},
                 "fields": [{"name": "data", "type": "hexbyte", "array": {"fixed": 24}}]}
            ]}]}"#,
        )
        .unwrap();
        let tree = rangecmp_tree(vec![compress(1, 0.0, 1000.0, 0.0, 30.0, 1.0)]);
        let mut meta = rangecmp_meta();
        let err = decompress_rangecmp(&mut meta, &tree, &db).unwrap_err();
        assert_eq!(err.status(), crate::core::Status::DecompressionFailure);
    }

    #[test]
    fn test_unsupported_rangecmp_generation() {
        let db = test_db();
        let mut meta = rangecmp_meta();
        meta.message_name = "RANGECMP2".to_string();
        assert!(decompress_rangecmp(&mut meta, &vec![], &db).is_err());
    }

    #[test]
    fn test_bit_helpers() {
        let mut data = vec![0u8; 4];
        pack_bits(&mut data, 3, 7, 0b1010101);
        assert_eq!(extract_bits(&data, 3, 7), 0b1010101);
        assert_eq!(sign_extend(0b1111, 4), -1);
        assert_eq!(sign_extend(0b0111, 4), 7);
    }
}
