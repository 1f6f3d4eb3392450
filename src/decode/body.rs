// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema-driven body decoding.
//!
//! Walks a field layout in order against the frame body and produces a
//! [`FieldTree`]. Binary bodies are read through a bounds-checked
//! little-endian cursor and must be consumed exactly; ASCII bodies are read
//! as delimited tokens and must end exactly at the checksum delimiter.

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{FieldTree, FieldValue, HeaderFormat, NamedField, Result, TranscodeError};
use crate::database::{ArrayKind, DataType, FieldDescriptor, MessageDatabase};

/// Guard against absurd count prefixes in corrupt-but-CRC-valid data.
const MAX_ARRAY_LENGTH: usize = 1_000_000;

/// Schema-driven body decoder.
pub struct BodyDecoder<'a> {
    db: &'a MessageDatabase,
}

impl<'a> BodyDecoder<'a> {
    /// Create a decoder over the given definition database.
    pub fn new(db: &'a MessageDatabase) -> Self {
        Self { db }
    }

    /// Decode a message body against its field layout.
    pub fn decode(
        &self,
        body: &[u8],
        format: HeaderFormat,
        fields: &[FieldDescriptor],
    ) -> Result<FieldTree> {
        match format {
            HeaderFormat::Binary | HeaderFormat::ShortBinary => {
                let mut cursor = BinaryCursor::new(body);
                let tree = self.decode_fields_binary(&mut cursor, fields)?;
                if cursor.remaining() != 0 {
                    return Err(TranscodeError::malformed(
                        "binary body",
                        format!("{} trailing bytes after the last field", cursor.remaining()),
                    ));
                }
                Ok(tree)
            }
            HeaderFormat::Ascii | HeaderFormat::ShortAscii | HeaderFormat::AbbAscii => {
                let text = std::str::from_utf8(body)
                    .map_err(|_| TranscodeError::malformed("ascii body", "not valid UTF-8"))?;
                let tokens = if format == HeaderFormat::AbbAscii {
                    tokenize_abbreviated(text)
                } else {
                    tokenize_delimited(text)
                };
                let mut cursor = TokenCursor::new(tokens);
                let tree = self.decode_fields_ascii(&mut cursor, fields)?;
                if cursor.remaining() != 0 {
                    return Err(TranscodeError::malformed(
                        "ascii body",
                        format!("{} trailing tokens after the last field", cursor.remaining()),
                    ));
                }
                Ok(tree)
            }
            other => Err(TranscodeError::unsupported(format!(
                "body decoding for {other}"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Binary
    // ------------------------------------------------------------------

    fn decode_fields_binary(
        &self,
        cursor: &mut BinaryCursor<'_>,
        fields: &[FieldDescriptor],
    ) -> Result<FieldTree> {
        let mut tree = FieldTree::with_capacity(fields.len());
        for field in fields {
            let value = self.decode_field_binary(cursor, field)?;
            tree.push(NamedField::new(field.name.clone(), value));
        }
        Ok(tree)
    }

    fn decode_field_binary(
        &self,
        cursor: &mut BinaryCursor<'_>,
        field: &FieldDescriptor,
    ) -> Result<FieldValue> {
        match field.array_kind()? {
            ArrayKind::None => self.decode_scalar_binary(cursor, field),
            ArrayKind::Fixed(count) => match field.data_type {
                DataType::String => {
                    let bytes = cursor.read_bytes(count)?;
                    Ok(FieldValue::String(trim_nul(bytes)?))
                }
                DataType::HexByte => Ok(FieldValue::Hex(cursor.read_bytes(count)?.to_vec())),
                _ => {
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(self.decode_scalar_binary(cursor, field)?);
                    }
                    Ok(FieldValue::Array(values))
                }
            },
            ArrayKind::Variable(max) => {
                let count = cursor.read_u32()? as usize;
                if count > max || count > MAX_ARRAY_LENGTH {
                    return Err(TranscodeError::field_decode(
                        &field.name,
                        field.data_type.token(),
                        format!("array count {count} exceeds maximum {max}"),
                    ));
                }
                if field.data_type == DataType::String {
                    let bytes = cursor.read_bytes(count)?;
                    return Ok(FieldValue::String(to_utf8(bytes)?));
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(self.decode_scalar_binary(cursor, field)?);
                }
                Ok(FieldValue::Array(values))
            }
            ArrayKind::Terminated => match field.data_type {
                DataType::String => {
                    let bytes = cursor.read_until_nul()?;
                    let value = to_utf8(bytes)?;
                    cursor.align(4)?;
                    Ok(FieldValue::String(value))
                }
                _ => {
                    // Elements until the zero sentinel, sentinel consumed.
                    let mut values = Vec::new();
                    loop {
                        let value = self.decode_scalar_binary(cursor, field)?;
                        if value.as_f64() == Some(0.0) {
                            break;
                        }
                        values.push(value);
                    }
                    Ok(FieldValue::Array(values))
                }
            },
        }
    }

    fn decode_scalar_binary(
        &self,
        cursor: &mut BinaryCursor<'_>,
        field: &FieldDescriptor,
    ) -> Result<FieldValue> {
        Ok(match field.data_type {
            DataType::Bool => FieldValue::Bool(cursor.read_u32()? != 0),
            DataType::Char => FieldValue::Int8(cursor.read_u8()? as i8),
            DataType::UChar => FieldValue::UInt8(cursor.read_u8()?),
            DataType::Short => FieldValue::Int16(cursor.read_u16()? as i16),
            DataType::UShort => FieldValue::UInt16(cursor.read_u16()?),
            DataType::Long => FieldValue::Int32(cursor.read_u32()? as i32),
            DataType::ULong => FieldValue::UInt32(cursor.read_u32()?),
            DataType::LongLong => FieldValue::Int64(cursor.read_u64()? as i64),
            DataType::ULongLong => FieldValue::UInt64(cursor.read_u64()?),
            DataType::Float => FieldValue::Float32(cursor.read_f32()?),
            DataType::Double => FieldValue::Float64(cursor.read_f64()?),
            DataType::HexByte => FieldValue::Hex(vec![cursor.read_u8()?]),
            DataType::Enum => {
                let value = cursor.read_u32()?;
                self.enum_value(field, value)?
            }
            DataType::String => {
                let bytes = cursor.read_until_nul()?;
                let value = to_utf8(bytes)?;
                cursor.align(4)?;
                FieldValue::String(value)
            }
            DataType::Struct => {
                let nested = self.db.struct_fields(field)?;
                FieldValue::Struct(self.decode_fields_binary(cursor, nested)?)
            }
        })
    }

    // ------------------------------------------------------------------
    // ASCII
    // ------------------------------------------------------------------

    fn decode_fields_ascii(
        &self,
        cursor: &mut TokenCursor,
        fields: &[FieldDescriptor],
    ) -> Result<FieldTree> {
        let mut tree = FieldTree::with_capacity(fields.len());
        for field in fields {
            let value = self.decode_field_ascii(cursor, field)?;
            tree.push(NamedField::new(field.name.clone(), value));
        }
        Ok(tree)
    }

    fn decode_field_ascii(
        &self,
        cursor: &mut TokenCursor,
        field: &FieldDescriptor,
    ) -> Result<FieldValue> {
        match field.array_kind()? {
            ArrayKind::None => self.decode_scalar_ascii(cursor, field),
            ArrayKind::Fixed(count) => match field.data_type {
                DataType::String => self.decode_scalar_ascii(cursor, field),
                DataType::HexByte => {
                    let token = cursor.next(&field.name)?;
                    Ok(FieldValue::Hex(parse_hex_bytes(&token, count, field)?))
                }
                _ => {
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(self.decode_scalar_ascii(cursor, field)?);
                    }
                    Ok(FieldValue::Array(values))
                }
            },
            ArrayKind::Variable(max) => {
                let count: usize = cursor.parse(&field.name)?;
                if count > max {
                    return Err(TranscodeError::field_decode(
                        &field.name,
                        field.data_type.token(),
                        format!("array count {count} exceeds maximum {max}"),
                    ));
                }
                if field.data_type == DataType::String {
                    return self.decode_scalar_ascii(cursor, field);
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(self.decode_scalar_ascii(cursor, field)?);
                }
                Ok(FieldValue::Array(values))
            }
            ArrayKind::Terminated => {
                if field.data_type == DataType::String {
                    return self.decode_scalar_ascii(cursor, field);
                }
                // No in-band terminator in ASCII; the array runs to the end
                // of the token stream, so it is only valid as a last field.
                let mut values = Vec::new();
                while cursor.remaining() > 0 {
                    values.push(self.decode_scalar_ascii(cursor, field)?);
                }
                Ok(FieldValue::Array(values))
            }
        }
    }

    fn decode_scalar_ascii(
        &self,
        cursor: &mut TokenCursor,
        field: &FieldDescriptor,
    ) -> Result<FieldValue> {
        Ok(match field.data_type {
            DataType::Bool => match cursor.next(&field.name)?.as_str() {
                "TRUE" | "1" => FieldValue::Bool(true),
                "FALSE" | "0" => FieldValue::Bool(false),
                other => {
                    return Err(TranscodeError::field_decode(
                        &field.name,
                        "bool",
                        format!("invalid bool token '{other}'"),
                    ))
                }
            },
            DataType::Char => FieldValue::Int8(cursor.parse(&field.name)?),
            DataType::UChar => FieldValue::UInt8(cursor.parse(&field.name)?),
            DataType::Short => FieldValue::Int16(cursor.parse(&field.name)?),
            DataType::UShort => FieldValue::UInt16(cursor.parse(&field.name)?),
            DataType::Long => FieldValue::Int32(cursor.parse(&field.name)?),
            DataType::ULong => FieldValue::UInt32(cursor.parse(&field.name)?),
            DataType::LongLong => FieldValue::Int64(cursor.parse(&field.name)?),
            DataType::ULongLong => FieldValue::UInt64(cursor.parse(&field.name)?),
            DataType::Float => FieldValue::Float32(cursor.parse(&field.name)?),
            DataType::Double => FieldValue::Float64(cursor.parse(&field.name)?),
            DataType::HexByte => {
                let token = cursor.next(&field.name)?;
                FieldValue::Hex(parse_hex_bytes(&token, 1, field)?)
            }
            DataType::Enum => {
                let token = cursor.next(&field.name)?;
                self.enum_label(field, &token)?
            }
            DataType::String => FieldValue::String(cursor.next(&field.name)?),
            DataType::Struct => {
                let nested = self.db.struct_fields(field)?;
                FieldValue::Struct(self.decode_fields_ascii(cursor, nested)?)
            }
        })
    }

    // ------------------------------------------------------------------
    // Enum resolution
    // ------------------------------------------------------------------

    fn enum_definition(&self, field: &FieldDescriptor) -> Result<&crate::database::EnumDefinition> {
        let name = field.enum_name.as_deref().ok_or_else(|| {
            TranscodeError::field_decode(&field.name, "enum", "field names no enum")
        })?;
        self.db.get_enum(name).ok_or_else(|| {
            TranscodeError::field_decode(&field.name, "enum", format!("enum '{name}' not defined"))
        })
    }

    fn enum_value(&self, field: &FieldDescriptor, value: u32) -> Result<FieldValue> {
        let def = self.enum_definition(field)?;
        let label = def.label_of(value).ok_or_else(|| {
            TranscodeError::field_decode(
                &field.name,
                "enum",
                format!("value {value} not in enum '{}'", def.name),
            )
        })?;
        Ok(FieldValue::Enum {
            value,
            label: label.to_string(),
        })
    }

    fn enum_label(&self, field: &FieldDescriptor, label: &str) -> Result<FieldValue> {
        let def = self.enum_definition(field)?;
        let value = def.value_of(label).ok_or_else(|| {
            TranscodeError::field_decode(
                &field.name,
                "enum",
                format!("label '{label}' not in enum '{}'", def.name),
            )
        })?;
        Ok(FieldValue::Enum {
            value,
            label: label.to_string(),
        })
    }
}

// ----------------------------------------------------------------------
// Cursors
// ----------------------------------------------------------------------

/// Bounds-checked little-endian reader over a binary body.
struct BinaryCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(TranscodeError::buffer_too_short(
                count,
                self.remaining(),
                self.pos,
            ));
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Read up to and including the NUL terminator, returning the bytes
    /// before it.
    fn read_until_nul(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let nul = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| {
                TranscodeError::malformed("binary string", "missing NUL terminator")
            })?;
        self.pos = start + nul + 1;
        Ok(&self.data[start..start + nul])
    }

    /// Skip padding so the cursor sits on an `alignment`-byte boundary
    /// relative to the body start. Trailing padding short of the boundary is
    /// tolerated at the end of the body.
    fn align(&mut self, alignment: usize) -> Result<()> {
        let rem = self.pos % alignment;
        if rem != 0 {
            let pad = (alignment - rem).min(self.remaining());
            self.pos += pad;
        }
        Ok(())
    }
}

/// Reader over the delimited tokens of an ASCII body.
struct TokenCursor {
    tokens: Vec<String>,
    pos: usize,
}

impl TokenCursor {
    fn new(tokens: Vec<String>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    fn next(&mut self, field: &str) -> Result<String> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| {
                TranscodeError::field_decode(field, "token", "token stream exhausted")
            })?
            .clone();
        self.pos += 1;
        Ok(token)
    }

    fn parse<T: std::str::FromStr>(&mut self, field: &str) -> Result<T> {
        let token = self.next(field)?;
        token.parse().map_err(|_| {
            TranscodeError::field_decode(field, "token", format!("invalid token '{token}'"))
        })
    }
}

/// Split a framed-ASCII body on commas, honoring quoted strings.
fn tokenize_delimited(text: &str) -> Vec<String> {
    split_tokens(text, |c| c == ',')
}

/// Split an abbreviated-ASCII body on whitespace, dropping the `<` line
/// markers.
fn tokenize_abbreviated(text: &str) -> Vec<String> {
    split_tokens(text, |c| c.is_ascii_whitespace())
        .into_iter()
        .filter(|t| !t.is_empty() && t != "<")
        .collect()
}

fn split_tokens(text: &str, is_delimiter: impl Fn(char) -> bool) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut any = false;
    for c in text.chars() {
        if c == '"' {
            quoted = !quoted;
            any = true;
            continue;
        }
        if !quoted && is_delimiter(c) {
            tokens.push(std::mem::take(&mut current));
            any = false;
            continue;
        }
        current.push(c);
    }
    if any || !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_hex_bytes(token: &str, count: usize, field: &FieldDescriptor) -> Result<Vec<u8>> {
    if token.len() != count * 2 {
        return Err(TranscodeError::field_decode(
            &field.name,
            "hexbyte",
            format!("expected {} hex digits, got {}", count * 2, token.len()),
        ));
    }
    (0..count)
        .map(|i| {
            u8::from_str_radix(&token[i * 2..i * 2 + 2], 16).map_err(|_| {
                TranscodeError::field_decode(&field.name, "hexbyte", "invalid hex digit")
            })
        })
        .collect()
}

fn to_utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| TranscodeError::malformed("string field", "not valid UTF-8"))
}

fn trim_nul(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    to_utf8(&bytes[..end])
}
