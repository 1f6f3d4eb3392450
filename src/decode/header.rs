// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Header decoding for every wire format.
//!
//! Populates [`MessageMetadata`] from a verified frame and resolves the
//! message definition the body decoder will use. The resolved definition is
//! returned alongside the metadata so the lookup happens once per frame.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{
    HeaderFormat, MeasurementSource, MessageMetadata, Result, TimeStatus, TranscodeError,
};
use crate::database::{MessageDatabase, MessageDefinition};
use crate::framer::{
    Frame, ASCII_HEADER_TERMINATOR, BINARY_HEADER_LENGTH, SHORT_BINARY_HEADER_LENGTH,
};

/// Bit layout of the binary header's message-type byte.
const MESSAGE_TYPE_RESPONSE_MASK: u8 = 0b1000_0000;
const MESSAGE_TYPE_SOURCE_MASK: u8 = 0b0001_1111;

/// Known port addresses and their ASCII header names.
const PORTS: &[(u8, &str)] = &[
    (0x00, "NO_PORTS"),
    (0x20, "COM1"),
    (0x40, "COM2"),
    (0x60, "COM3"),
    (0x80, "USB1"),
    (0xA0, "USB2"),
    (0xC0, "THISPORT"),
    (0xE0, "ICOM1"),
];

/// ASCII header name for a port address.
pub fn port_name(address: u8) -> String {
    PORTS
        .iter()
        .find(|(value, _)| *value == address)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| address.to_string())
}

/// Port address for an ASCII header token.
pub fn port_address(name: &str) -> u8 {
    PORTS
        .iter()
        .find(|(_, port)| *port == name)
        .map(|(value, _)| *value)
        .unwrap_or_else(|| name.parse().unwrap_or(0))
}

/// Decode a frame's header into metadata and resolve its definition.
///
/// The definition is `None` when the database has no matching entry; the
/// metadata is fully populated either way so the framer outcome is not
/// lost. NMEA and command-response frames resolve no definition.
pub fn decode_header(
    frame: &Frame,
    db: &MessageDatabase,
) -> Result<(MessageMetadata, Option<Arc<MessageDefinition>>)> {
    let mut meta = MessageMetadata {
        format: frame.format,
        message_length: frame.data.len() as u32,
        response: frame.response,
        ..Default::default()
    };

    let definition = match frame.format {
        HeaderFormat::Binary => decode_binary(frame, &mut meta, db)?,
        HeaderFormat::ShortBinary => decode_short_binary(frame, &mut meta, db)?,
        HeaderFormat::Ascii | HeaderFormat::ShortAscii => decode_ascii(frame, &mut meta, db)?,
        HeaderFormat::AbbAscii => decode_abbreviated(frame, &mut meta, db)?,
        HeaderFormat::Nmea => {
            decode_nmea(frame, &mut meta)?;
            None
        }
        other => {
            return Err(TranscodeError::malformed(
                "header",
                format!("{other} frames carry no decodable header"),
            ))
        }
    };

    Ok((meta, definition))
}

fn decode_binary(
    frame: &Frame,
    meta: &mut MessageMetadata,
    db: &MessageDatabase,
) -> Result<Option<Arc<MessageDefinition>>> {
    let data = &frame.data;
    if data.len() < BINARY_HEADER_LENGTH {
        return Err(TranscodeError::buffer_too_short(
            BINARY_HEADER_LENGTH,
            data.len(),
            0,
        ));
    }

    meta.header_length = data[3] as u32;
    meta.message_id = LittleEndian::read_u16(&data[4..6]);

    let message_type = data[6];
    meta.response = message_type & MESSAGE_TYPE_RESPONSE_MASK != 0;
    meta.measurement_source = match message_type & MESSAGE_TYPE_SOURCE_MASK {
        0 => MeasurementSource::Primary,
        1 => MeasurementSource::Secondary,
        _ => MeasurementSource::Unknown,
    };

    meta.port_address = data[7];
    meta.sequence = LittleEndian::read_u16(&data[10..12]);
    meta.idle_time = data[12];
    meta.time_status = TimeStatus::from_raw(data[13]);
    meta.gps_week = LittleEndian::read_u16(&data[14..16]);
    meta.milliseconds = LittleEndian::read_u32(&data[16..20]) as f64;
    meta.receiver_status = LittleEndian::read_u32(&data[20..24]);
    let header_crc16 = LittleEndian::read_u16(&data[24..26]);
    meta.receiver_sw_version = LittleEndian::read_u16(&data[26..28]);

    Ok(resolve_by_id(meta, header_crc16, db))
}

fn decode_short_binary(
    frame: &Frame,
    meta: &mut MessageMetadata,
    db: &MessageDatabase,
) -> Result<Option<Arc<MessageDefinition>>> {
    let data = &frame.data;
    if data.len() < SHORT_BINARY_HEADER_LENGTH {
        return Err(TranscodeError::buffer_too_short(
            SHORT_BINARY_HEADER_LENGTH,
            data.len(),
            0,
        ));
    }

    meta.header_length = SHORT_BINARY_HEADER_LENGTH as u32;
    meta.message_id = LittleEndian::read_u16(&data[4..6]);
    meta.gps_week = LittleEndian::read_u16(&data[6..8]);
    meta.milliseconds = LittleEndian::read_u32(&data[8..12]) as f64;

    Ok(resolve_by_id(meta, 0, db))
}

fn resolve_by_id(
    meta: &mut MessageMetadata,
    header_crc16: u16,
    db: &MessageDatabase,
) -> Option<Arc<MessageDefinition>> {
    let definition = db.get_by_id(meta.message_id, meta.format, meta.measurement_source)?;
    meta.message_name = definition.name.clone();
    meta.message_definition_crc = definition.layout_for_crc16(header_crc16).def_crc;
    Some(definition)
}

fn decode_ascii(
    frame: &Frame,
    meta: &mut MessageMetadata,
    db: &MessageDatabase,
) -> Result<Option<Arc<MessageDefinition>>> {
    let data = &frame.data;
    let terminator = data
        .iter()
        .position(|&b| b == ASCII_HEADER_TERMINATOR)
        .ok_or_else(|| TranscodeError::malformed("ascii header", "missing ';' terminator"))?;
    meta.header_length = terminator as u32 + 1;

    let header = std::str::from_utf8(&data[1..terminator])
        .map_err(|_| TranscodeError::malformed("ascii header", "not valid UTF-8"))?;
    let mut tokens = header.split(',');
    let mut next = |what: &str| {
        tokens
            .next()
            .ok_or_else(|| TranscodeError::malformed("ascii header", format!("missing {what}")))
    };

    let name_token = next("message name")?;
    let (name, source) = split_name(name_token, true);
    meta.message_name = name;
    meta.measurement_source = source;

    let mut header_crc16 = 0u16;
    if frame.format == HeaderFormat::Ascii {
        meta.port_address = port_address(next("port")?);
        meta.sequence = parse(next("sequence")?, "sequence")?;
        let idle: f64 = parse(next("idle time")?, "idle time")?;
        meta.idle_time = (idle * 2.0).round() as u8;
        let status_token = next("time status")?;
        meta.time_status = TimeStatus::from_name(status_token).ok_or_else(|| {
            TranscodeError::malformed("ascii header", format!("unknown time status '{status_token}'"))
        })?;
        meta.gps_week = parse(next("week")?, "week")?;
        let seconds: f64 = parse(next("seconds")?, "seconds")?;
        meta.milliseconds = seconds * 1000.0;
        meta.receiver_status = parse_hex(next("receiver status")?, "receiver status")?;
        header_crc16 = parse_hex(next("definition crc")?, "definition crc")? as u16;
        meta.receiver_sw_version = parse(next("software version")?, "software version")?;
    } else {
        meta.gps_week = parse(next("week")?, "week")?;
        let seconds: f64 = parse(next("seconds")?, "seconds")?;
        meta.milliseconds = seconds * 1000.0;
    }

    Ok(resolve_by_name(meta, header_crc16, db))
}

fn decode_abbreviated(
    frame: &Frame,
    meta: &mut MessageMetadata,
    db: &MessageDatabase,
) -> Result<Option<Arc<MessageDefinition>>> {
    let data = &frame.data;
    let line_end = data
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(data.len());
    meta.header_length = line_end as u32;

    if frame.response {
        // `<OK`, `<ERROR:...` and `[PORT]` prompts carry no log header.
        let text = std::str::from_utf8(&data[1..line_end])
            .map_err(|_| TranscodeError::malformed("abbreviated header", "not valid UTF-8"))?;
        meta.message_name = text
            .trim_end_matches(['\r', '\n', ']'])
            .split([' ', ':', ','])
            .next()
            .unwrap_or_default()
            .to_string();
        return Ok(None);
    }

    let line = std::str::from_utf8(&data[1..line_end])
        .map_err(|_| TranscodeError::malformed("abbreviated header", "not valid UTF-8"))?;
    let mut tokens = line.split_whitespace();
    let mut next = |what: &str| {
        tokens.next().ok_or_else(|| {
            TranscodeError::malformed("abbreviated header", format!("missing {what}"))
        })
    };

    // Same ten fields as the framed ASCII header, space-delimited, and the
    // name carries no format letter.
    let (name, source) = split_name(next("message name")?, false);
    meta.message_name = name;
    meta.measurement_source = source;
    meta.port_address = port_address(next("port")?);
    meta.sequence = parse(next("sequence")?, "sequence")?;
    let idle: f64 = parse(next("idle time")?, "idle time")?;
    meta.idle_time = (idle * 2.0).round() as u8;
    let status_token = next("time status")?;
    meta.time_status = TimeStatus::from_name(status_token).ok_or_else(|| {
        TranscodeError::malformed(
            "abbreviated header",
            format!("unknown time status '{status_token}'"),
        )
    })?;
    meta.gps_week = parse(next("week")?, "week")?;
    let seconds: f64 = parse(next("seconds")?, "seconds")?;
    meta.milliseconds = seconds * 1000.0;
    meta.receiver_status = parse_hex(next("receiver status")?, "receiver status")?;
    let header_crc16 = parse_hex(next("definition crc")?, "definition crc")? as u16;
    meta.receiver_sw_version = parse(next("software version")?, "software version")?;

    Ok(resolve_by_name(meta, header_crc16, db))
}

fn resolve_by_name(
    meta: &mut MessageMetadata,
    header_crc16: u16,
    db: &MessageDatabase,
) -> Option<Arc<MessageDefinition>> {
    let definition = db.get_by_name(&meta.message_name, meta.format, meta.measurement_source)?;
    meta.message_id = definition.id;
    meta.message_definition_crc = definition.layout_for_crc16(header_crc16).def_crc;
    Some(definition)
}

fn decode_nmea(frame: &Frame, meta: &mut MessageMetadata) -> Result<()> {
    let data = &frame.data;
    let comma = data
        .iter()
        .position(|&b| b == b',')
        .ok_or_else(|| TranscodeError::malformed("nmea header", "missing talker delimiter"))?;
    meta.header_length = comma as u32 + 1;
    meta.message_name = std::str::from_utf8(&data[1..comma])
        .map_err(|_| TranscodeError::malformed("nmea header", "not valid UTF-8"))?
        .to_string();
    meta.time_status = TimeStatus::Unknown;
    Ok(())
}

/// Split an ASCII name token into the canonical name and source.
///
/// The framed ASCII formats append a format letter (`A`) after an optional
/// `_1` secondary-antenna suffix; abbreviated ASCII carries the suffix only.
fn split_name(token: &str, strip_format_letter: bool) -> (String, MeasurementSource) {
    let mut name = token;
    if strip_format_letter {
        name = name.strip_suffix('A').unwrap_or(name);
    }
    match name.strip_suffix("_1") {
        Some(base) => (base.to_string(), MeasurementSource::Secondary),
        None => (name.to_string(), MeasurementSource::Primary),
    }
}

/// Reassemble the ASCII name token for a metadata record.
pub fn ascii_name(meta: &MessageMetadata, format_letter: bool) -> String {
    let mut name = meta.message_name.clone();
    if meta.measurement_source == MeasurementSource::Secondary {
        name.push_str("_1");
    }
    if format_letter {
        name.push('A');
    }
    name
}

fn parse<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .trim()
        .parse()
        .map_err(|_| TranscodeError::malformed("header", format!("invalid {what} '{token}'")))
}

fn parse_hex(token: &str, what: &str) -> Result<u32> {
    u32::from_str_radix(token.trim(), 16)
        .map_err(|_| TranscodeError::malformed("header", format!("invalid {what} '{token}'")))
}
