// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message encoding.
//!
//! Serializes a metadata record and field tree into the target wire
//! format. Binary output is little-endian with the CRC-32 computed over the
//! bytes as written; ASCII output is the canonical header, comma-delimited
//! fields, and the 8-digit hex CRC; flattened binary writes variable arrays
//! at their maximum arity so consumers can index at fixed offsets; JSON
//! carries the header and body as one object.
//!
//! Messages that arrived in a short framing keep it: a short-binary log
//! encoded to ASCII becomes short ASCII, and back.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::crc::crc32_block;
use crate::core::{
    EncodeFormat, FieldTree, FieldValue, HeaderFormat, MessageData, MessageMetadata, Result,
    TranscodeError, MAX_ASCII_MESSAGE_LENGTH,
};
use crate::database::{ArrayKind, DataType, FieldDescriptor, MessageDatabase};
use crate::decode::header::{ascii_name, port_name};
use crate::framer::{
    BINARY_HEADER_LENGTH, BINARY_SYNC1, BINARY_SYNC2, BINARY_SYNC3, SHORT_BINARY_HEADER_LENGTH,
    SHORT_BINARY_SYNC3,
};

/// Message encoder with a reusable scratch buffer.
pub struct Encoder<'a> {
    db: &'a MessageDatabase,
    scratch: Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Create an encoder over the given definition database.
    pub fn new(db: &'a MessageDatabase) -> Self {
        Self {
            db,
            scratch: Vec::with_capacity(1024),
        }
    }

    /// Encode a decoded message into `out`.
    ///
    /// `fields` is the layout the body was decoded with; the tree is walked
    /// in lockstep with it. The metadata is not modified: its lengths
    /// describe the consumed input, while `out` describes the produced
    /// output.
    pub fn encode(
        &mut self,
        meta: &MessageMetadata,
        fields: &[FieldDescriptor],
        tree: &FieldTree,
        format: EncodeFormat,
        out: &mut MessageData,
    ) -> Result<()> {
        self.scratch.clear();
        match format {
            EncodeFormat::Ascii => self.encode_ascii(meta, fields, tree, out),
            EncodeFormat::Binary => self.encode_binary(meta, fields, tree, false, out),
            EncodeFormat::FlattenedBinary => self.encode_binary(meta, fields, tree, true, out),
            EncodeFormat::Json => self.encode_json(meta, tree, out),
            EncodeFormat::Unspecified => {
                Err(TranscodeError::unsupported("encoding to UNSPECIFIED"))
            }
        }
    }

    // ------------------------------------------------------------------
    // Binary
    // ------------------------------------------------------------------

    fn encode_binary(
        &mut self,
        meta: &MessageMetadata,
        fields: &[FieldDescriptor],
        tree: &FieldTree,
        flatten: bool,
        out: &mut MessageData,
    ) -> Result<()> {
        let short = matches!(
            meta.format,
            HeaderFormat::ShortBinary | HeaderFormat::ShortAscii
        );
        let header_length = if short {
            SHORT_BINARY_HEADER_LENGTH
        } else {
            BINARY_HEADER_LENGTH
        };

        let buf = &mut self.scratch;
        if short {
            buf.extend_from_slice(&[BINARY_SYNC1, BINARY_SYNC2, SHORT_BINARY_SYNC3]);
            buf.push(0); // body length backpatched below
            buf.write_u16::<LittleEndian>(meta.message_id)?;
            buf.write_u16::<LittleEndian>(meta.gps_week)?;
            buf.write_u32::<LittleEndian>(meta.milliseconds.round() as u32)?;
        } else {
            buf.extend_from_slice(&[BINARY_SYNC1, BINARY_SYNC2, BINARY_SYNC3]);
            buf.push(BINARY_HEADER_LENGTH as u8);
            buf.write_u16::<LittleEndian>(meta.message_id)?;
            buf.push(message_type_byte(meta));
            buf.push(meta.port_address);
            buf.write_u16::<LittleEndian>(0)?; // body length backpatched below
            buf.write_u16::<LittleEndian>(meta.sequence)?;
            buf.push(meta.idle_time);
            buf.push(meta.time_status.raw());
            buf.write_u16::<LittleEndian>(meta.gps_week)?;
            buf.write_u32::<LittleEndian>(meta.milliseconds.round() as u32)?;
            buf.write_u32::<LittleEndian>(meta.receiver_status)?;
            buf.write_u16::<LittleEndian>((meta.message_definition_crc & 0xFFFF) as u16)?;
            buf.write_u16::<LittleEndian>(meta.receiver_sw_version)?;
        }

        write_fields_binary(buf, self.db, fields, tree, flatten)?;

        let body_length = buf.len() - header_length;
        if short {
            if body_length > u8::MAX as usize {
                return Err(TranscodeError::malformed(
                    "short binary body",
                    format!("{body_length} bytes exceeds the 8-bit length field"),
                ));
            }
            buf[3] = body_length as u8;
        } else {
            if body_length > u16::MAX as usize {
                return Err(TranscodeError::malformed(
                    "binary body",
                    format!("{body_length} bytes exceeds the 16-bit length field"),
                ));
            }
            LittleEndian::write_u16(&mut buf[8..10], body_length as u16);
        }

        let crc = crc32_block(0, buf);
        buf.write_u32::<LittleEndian>(crc)?;

        check_capacity(buf.len())?;
        out.fill(buf, 0..header_length, header_length..header_length + body_length);
        Ok(())
    }

    // ------------------------------------------------------------------
    // ASCII
    // ------------------------------------------------------------------

    fn encode_ascii(
        &mut self,
        meta: &MessageMetadata,
        fields: &[FieldDescriptor],
        tree: &FieldTree,
        out: &mut MessageData,
    ) -> Result<()> {
        let short = matches!(
            meta.format,
            HeaderFormat::ShortBinary | HeaderFormat::ShortAscii
        );
        let sync = if short { '%' } else { '#' };

        let mut text = String::new();
        if short {
            text.push_str(&format!(
                "{},{},{:.3};",
                ascii_name(meta, true),
                meta.gps_week,
                meta.seconds()
            ));
        } else {
            text.push_str(&format!(
                "{},{},{},{:.1},{},{},{:.3},{:08x},{:04x},{};",
                ascii_name(meta, true),
                port_name(meta.port_address),
                meta.sequence,
                meta.idle_time as f64 / 2.0,
                meta.time_status.name(),
                meta.gps_week,
                meta.seconds(),
                meta.receiver_status,
                meta.message_definition_crc & 0xFFFF,
                meta.receiver_sw_version
            ));
        }
        let header_end = text.len() + 1; // sync included

        let mut tokens = Vec::new();
        write_fields_ascii(&mut tokens, self.db, fields, tree)?;
        text.push_str(&tokens.join(","));

        let crc = crc32_block(0, text.as_bytes());
        let message = format!("{sync}{text}*{crc:08x}\r\n");

        check_capacity(message.len())?;
        let body_end = message.len() - 11; // '*' + 8 hex + CRLF
        out.fill(message.as_bytes(), 0..header_end, header_end..body_end);
        Ok(())
    }

    // ------------------------------------------------------------------
    // JSON
    // ------------------------------------------------------------------

    fn encode_json(
        &mut self,
        meta: &MessageMetadata,
        tree: &FieldTree,
        out: &mut MessageData,
    ) -> Result<()> {
        let header = serde_json::to_string(meta)
            .map_err(|e| TranscodeError::malformed("json header", e.to_string()))?;
        let body = serde_json::to_string(&TreeAsMap(tree))
            .map_err(|e| TranscodeError::malformed("json body", e.to_string()))?;
        let message = format!("{{\"header\":{header},\"body\":{body}}}");

        check_capacity(message.len())?;
        let header_start = "{\"header\":".len();
        let body_start = header_start + header.len() + ",\"body\":".len();
        out.fill(
            message.as_bytes(),
            header_start..header_start + header.len(),
            body_start..body_start + body.len(),
        );
        Ok(())
    }
}

/// Serialize a field tree as an ordered JSON map.
struct TreeAsMap<'a>(&'a FieldTree);

impl Serialize for TreeAsMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

fn check_capacity(len: usize) -> Result<()> {
    if len > MAX_ASCII_MESSAGE_LENGTH {
        return Err(TranscodeError::buffer_full(len, MAX_ASCII_MESSAGE_LENGTH));
    }
    Ok(())
}

fn message_type_byte(meta: &MessageMetadata) -> u8 {
    let mut byte = match meta.measurement_source {
        crate::core::MeasurementSource::Primary => 0,
        crate::core::MeasurementSource::Secondary => 1,
        crate::core::MeasurementSource::Unknown => 0b0001_1111,
    };
    if meta.response {
        byte |= 0b1000_0000;
    }
    byte
}

// ----------------------------------------------------------------------
// Binary field writing
// ----------------------------------------------------------------------

fn write_fields_binary(
    buf: &mut Vec<u8>,
    db: &MessageDatabase,
    fields: &[FieldDescriptor],
    tree: &FieldTree,
    flatten: bool,
) -> Result<()> {
    if fields.len() != tree.len() {
        return Err(TranscodeError::malformed(
            "encode",
            format!("tree has {} fields, layout has {}", tree.len(), fields.len()),
        ));
    }
    for (field, named) in fields.iter().zip(tree) {
        write_field_binary(buf, db, field, &named.value, flatten)?;
    }
    Ok(())
}

fn write_field_binary(
    buf: &mut Vec<u8>,
    db: &MessageDatabase,
    field: &FieldDescriptor,
    value: &FieldValue,
    flatten: bool,
) -> Result<()> {
    match field.array_kind()? {
        ArrayKind::None => write_scalar_binary(buf, db, field, value, flatten),
        ArrayKind::Fixed(count) => match field.data_type {
            DataType::String => {
                let text = expect_str(field, value)?;
                if text.len() > count {
                    return Err(field_error(field, "string exceeds fixed length"));
                }
                buf.extend_from_slice(text.as_bytes());
                buf.resize(buf.len() + count - text.len(), 0);
                Ok(())
            }
            DataType::HexByte => {
                let bytes = expect_hex(field, value)?;
                if bytes.len() != count {
                    return Err(field_error(field, "hex length does not match layout"));
                }
                buf.extend_from_slice(bytes);
                Ok(())
            }
            _ => {
                let values = expect_array(field, value)?;
                if values.len() != count {
                    return Err(field_error(field, "array arity does not match layout"));
                }
                for element in values {
                    write_scalar_binary(buf, db, field, element, flatten)?;
                }
                Ok(())
            }
        },
        ArrayKind::Variable(max) => {
            if field.data_type == DataType::String {
                let text = expect_str(field, value)?;
                if text.len() > max {
                    return Err(field_error(field, "string exceeds maximum length"));
                }
                buf.write_u32::<LittleEndian>(text.len() as u32)?;
                buf.extend_from_slice(text.as_bytes());
                if flatten {
                    buf.resize(buf.len() + max - text.len(), 0);
                }
                return Ok(());
            }
            let values = expect_array(field, value)?;
            if values.len() > max {
                return Err(field_error(field, "array exceeds maximum arity"));
            }
            buf.write_u32::<LittleEndian>(values.len() as u32)?;
            for element in values {
                write_scalar_binary(buf, db, field, element, flatten)?;
            }
            if flatten {
                for _ in values.len()..max {
                    write_zero_binary(buf, db, field)?;
                }
            }
            Ok(())
        }
        ArrayKind::Terminated => match field.data_type {
            DataType::String => {
                let text = expect_str(field, value)?;
                buf.extend_from_slice(text.as_bytes());
                buf.push(0);
                pad_to(buf, 4);
                Ok(())
            }
            _ => {
                let values = expect_array(field, value)?;
                for element in values {
                    write_scalar_binary(buf, db, field, element, flatten)?;
                }
                write_zero_binary(buf, db, field)?;
                Ok(())
            }
        },
    }
}

fn write_scalar_binary(
    buf: &mut Vec<u8>,
    db: &MessageDatabase,
    field: &FieldDescriptor,
    value: &FieldValue,
    flatten: bool,
) -> Result<()> {
    match (field.data_type, value) {
        (DataType::Bool, FieldValue::Bool(v)) => buf.write_u32::<LittleEndian>(*v as u32)?,
        (DataType::Char, FieldValue::Int8(v)) => buf.push(*v as u8),
        (DataType::UChar, FieldValue::UInt8(v)) => buf.push(*v),
        (DataType::Short, FieldValue::Int16(v)) => buf.write_i16::<LittleEndian>(*v)?,
        (DataType::UShort, FieldValue::UInt16(v)) => buf.write_u16::<LittleEndian>(*v)?,
        (DataType::Long, FieldValue::Int32(v)) => buf.write_i32::<LittleEndian>(*v)?,
        (DataType::ULong, FieldValue::UInt32(v)) => buf.write_u32::<LittleEndian>(*v)?,
        (DataType::LongLong, FieldValue::Int64(v)) => buf.write_i64::<LittleEndian>(*v)?,
        (DataType::ULongLong, FieldValue::UInt64(v)) => buf.write_u64::<LittleEndian>(*v)?,
        (DataType::Float, FieldValue::Float32(v)) => buf.write_f32::<LittleEndian>(*v)?,
        (DataType::Double, FieldValue::Float64(v)) => buf.write_f64::<LittleEndian>(*v)?,
        (DataType::Enum, FieldValue::Enum { value, .. }) => {
            buf.write_u32::<LittleEndian>(*value)?
        }
        (DataType::HexByte, FieldValue::Hex(bytes)) if bytes.len() == 1 => buf.push(bytes[0]),
        (DataType::String, FieldValue::String(text)) => {
            buf.extend_from_slice(text.as_bytes());
            buf.push(0);
            pad_to(buf, 4);
        }
        (DataType::Struct, FieldValue::Struct(tree)) => {
            let nested = db.struct_fields(field)?;
            write_fields_binary(buf, db, nested, tree, flatten)?;
        }
        (_, other) => {
            return Err(field_error(
                field,
                format!("value of type '{}' does not match layout", other.type_name()),
            ))
        }
    }
    Ok(())
}

/// Write a zero element for flattened-binary padding.
fn write_zero_binary(buf: &mut Vec<u8>, db: &MessageDatabase, field: &FieldDescriptor) -> Result<()> {
    match field.data_type {
        DataType::String => {
            buf.push(0);
            pad_to(buf, 4);
        }
        DataType::Struct => {
            let nested = db.struct_fields(field)?;
            for sub in nested {
                match sub.array_kind()? {
                    ArrayKind::None | ArrayKind::Terminated => write_zero_binary(buf, db, sub)?,
                    // A fixed string or hex run is `count` bytes flat.
                    ArrayKind::Fixed(count)
                        if matches!(sub.data_type, DataType::String | DataType::HexByte) =>
                    {
                        buf.resize(buf.len() + count, 0)
                    }
                    ArrayKind::Fixed(count) => {
                        for _ in 0..count {
                            write_zero_binary(buf, db, sub)?;
                        }
                    }
                    ArrayKind::Variable(_) => buf.write_u32::<LittleEndian>(0)?,
                }
            }
        }
        scalar => {
            if let Some(size) = scalar.binary_size() {
                buf.resize(buf.len() + size, 0);
            }
        }
    }
    Ok(())
}

fn pad_to(buf: &mut Vec<u8>, alignment: usize) {
    while buf.len() % alignment != 0 {
        buf.push(0);
    }
}

// ----------------------------------------------------------------------
// ASCII field writing
// ----------------------------------------------------------------------

fn write_fields_ascii(
    tokens: &mut Vec<String>,
    db: &MessageDatabase,
    fields: &[FieldDescriptor],
    tree: &FieldTree,
) -> Result<()> {
    if fields.len() != tree.len() {
        return Err(TranscodeError::malformed(
            "encode",
            format!("tree has {} fields, layout has {}", tree.len(), fields.len()),
        ));
    }
    for (field, named) in fields.iter().zip(tree) {
        write_field_ascii(tokens, db, field, &named.value)?;
    }
    Ok(())
}

fn write_field_ascii(
    tokens: &mut Vec<String>,
    db: &MessageDatabase,
    field: &FieldDescriptor,
    value: &FieldValue,
) -> Result<()> {
    match field.array_kind()? {
        ArrayKind::None => write_scalar_ascii(tokens, db, field, value),
        ArrayKind::Fixed(count) => match field.data_type {
            DataType::String => write_scalar_ascii(tokens, db, field, value),
            DataType::HexByte => {
                let bytes = expect_hex(field, value)?;
                if bytes.len() != count {
                    return Err(field_error(field, "hex length does not match layout"));
                }
                tokens.push(bytes.iter().map(|b| format!("{b:02x}")).collect());
                Ok(())
            }
            _ => {
                let values = expect_array(field, value)?;
                if values.len() != count {
                    return Err(field_error(field, "array arity does not match layout"));
                }
                for element in values {
                    write_scalar_ascii(tokens, db, field, element)?;
                }
                Ok(())
            }
        },
        ArrayKind::Variable(max) => {
            if field.data_type == DataType::String {
                return write_scalar_ascii(tokens, db, field, value);
            }
            let values = expect_array(field, value)?;
            if values.len() > max {
                return Err(field_error(field, "array exceeds maximum arity"));
            }
            tokens.push(values.len().to_string());
            for element in values {
                write_scalar_ascii(tokens, db, field, element)?;
            }
            Ok(())
        }
        ArrayKind::Terminated => {
            if field.data_type == DataType::String {
                return write_scalar_ascii(tokens, db, field, value);
            }
            let values = expect_array(field, value)?;
            for element in values {
                write_scalar_ascii(tokens, db, field, element)?;
            }
            Ok(())
        }
    }
}

fn write_scalar_ascii(
    tokens: &mut Vec<String>,
    db: &MessageDatabase,
    field: &FieldDescriptor,
    value: &FieldValue,
) -> Result<()> {
    let token = match (field.data_type, value) {
        (DataType::Bool, FieldValue::Bool(v)) => {
            if *v {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        (DataType::Char, FieldValue::Int8(v)) => v.to_string(),
        (DataType::UChar, FieldValue::UInt8(v)) => v.to_string(),
        (DataType::Short, FieldValue::Int16(v)) => v.to_string(),
        (DataType::UShort, FieldValue::UInt16(v)) => v.to_string(),
        (DataType::Long, FieldValue::Int32(v)) => v.to_string(),
        (DataType::ULong, FieldValue::UInt32(v)) => v.to_string(),
        (DataType::LongLong, FieldValue::Int64(v)) => v.to_string(),
        (DataType::ULongLong, FieldValue::UInt64(v)) => v.to_string(),
        (DataType::Float, FieldValue::Float32(v)) => v.to_string(),
        (DataType::Double, FieldValue::Float64(v)) => v.to_string(),
        (DataType::Enum, FieldValue::Enum { label, .. }) => label.clone(),
        (DataType::HexByte, FieldValue::Hex(bytes)) => {
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        }
        (DataType::String, FieldValue::String(text)) => format!("\"{text}\""),
        (DataType::Struct, FieldValue::Struct(tree)) => {
            let nested = db.struct_fields(field)?;
            return write_fields_ascii(tokens, db, nested, tree);
        }
        (_, other) => {
            return Err(field_error(
                field,
                format!("value of type '{}' does not match layout", other.type_name()),
            ))
        }
    };
    tokens.push(token);
    Ok(())
}

// ----------------------------------------------------------------------
// Tree access helpers
// ----------------------------------------------------------------------

fn expect_str<'v>(field: &FieldDescriptor, value: &'v FieldValue) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| field_error(field, "expected string value"))
}

fn expect_hex<'v>(field: &FieldDescriptor, value: &'v FieldValue) -> Result<&'v [u8]> {
    match value {
        FieldValue::Hex(bytes) => Ok(bytes),
        _ => Err(field_error(field, "expected hex value")),
    }
}

fn expect_array<'v>(field: &FieldDescriptor, value: &'v FieldValue) -> Result<&'v [FieldValue]> {
    value
        .as_array()
        .ok_or_else(|| field_error(field, "expected array value"))
}

fn field_error(field: &FieldDescriptor, cause: impl Into<String>) -> TranscodeError {
    TranscodeError::field_decode(&field.name, field.data_type.token(), cause)
}
