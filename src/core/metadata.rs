// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wire-format tags and per-message metadata.
//!
//! [`MessageMetadata`] is populated by the framer and header decoder and
//! travels with the message through filtering and encoding. Plain values,
//! freely copyable.

use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Maximum encoded ASCII message length, and the fixed capacity of the
/// pipeline output buffer.
pub const MAX_ASCII_MESSAGE_LENGTH: usize = 32768;

/// Maximum binary message length, bounded by the 16-bit length field.
pub const MAX_BINARY_MESSAGE_LENGTH: usize = 32768;

/// Wire format of a framed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderFormat {
    #[default]
    Unknown,
    Binary,
    ShortBinary,
    Ascii,
    ShortAscii,
    AbbAscii,
    Nmea,
    Json,
    /// Wildcard used by filter triples, never produced by the framer.
    All,
}

impl HeaderFormat {
    /// Check if this is one of the two binary framings.
    pub fn is_binary(self) -> bool {
        matches!(self, HeaderFormat::Binary | HeaderFormat::ShortBinary)
    }

    /// Check if this is one of the ASCII framings (NMEA excluded).
    pub fn is_ascii(self) -> bool {
        matches!(
            self,
            HeaderFormat::Ascii | HeaderFormat::ShortAscii | HeaderFormat::AbbAscii
        )
    }
}

impl fmt::Display for HeaderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderFormat::Unknown => "UNKNOWN",
            HeaderFormat::Binary => "BINARY",
            HeaderFormat::ShortBinary => "SHORT_BINARY",
            HeaderFormat::Ascii => "ASCII",
            HeaderFormat::ShortAscii => "SHORT_ASCII",
            HeaderFormat::AbbAscii => "ABB_ASCII",
            HeaderFormat::Nmea => "NMEA",
            HeaderFormat::Json => "JSON",
            HeaderFormat::All => "ALL",
        };
        write!(f, "{name}")
    }
}

/// Target format for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeFormat {
    Ascii,
    Binary,
    FlattenedBinary,
    Json,
    #[default]
    Unspecified,
}

impl FromStr for EncodeFormat {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ascii" => Ok(EncodeFormat::Ascii),
            "binary" => Ok(EncodeFormat::Binary),
            "flattened-binary" | "flattened_binary" | "flattenedbinary" => {
                Ok(EncodeFormat::FlattenedBinary)
            }
            "json" => Ok(EncodeFormat::Json),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EncodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodeFormat::Ascii => "ASCII",
            EncodeFormat::Binary => "BINARY",
            EncodeFormat::FlattenedBinary => "FLATTENED_BINARY",
            EncodeFormat::Json => "JSON",
            EncodeFormat::Unspecified => "UNSPECIFIED",
        };
        write!(f, "{name}")
    }
}

/// Receiver clock steering state, as carried in OEM headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeStatus {
    #[default]
    Unknown,
    Approximate,
    CoarseAdjusting,
    Coarse,
    CoarseSteering,
    FreeWheeling,
    FineAdjusting,
    Fine,
    FineBackupSteering,
    FineSteering,
    SatTime,
}

impl TimeStatus {
    /// Decode the raw header byte. Unrecognized values map to `Unknown`.
    pub fn from_raw(value: u8) -> Self {
        match value {
            20 => TimeStatus::Unknown,
            60 => TimeStatus::Approximate,
            80 => TimeStatus::CoarseAdjusting,
            100 => TimeStatus::Coarse,
            120 => TimeStatus::CoarseSteering,
            130 => TimeStatus::FreeWheeling,
            110 => TimeStatus::FineAdjusting,
            160 => TimeStatus::Fine,
            170 => TimeStatus::FineBackupSteering,
            180 => TimeStatus::FineSteering,
            200 => TimeStatus::SatTime,
            _ => TimeStatus::Unknown,
        }
    }

    /// The raw header byte for this status.
    pub fn raw(self) -> u8 {
        match self {
            TimeStatus::Unknown => 20,
            TimeStatus::Approximate => 60,
            TimeStatus::CoarseAdjusting => 80,
            TimeStatus::Coarse => 100,
            TimeStatus::CoarseSteering => 120,
            TimeStatus::FreeWheeling => 130,
            TimeStatus::FineAdjusting => 110,
            TimeStatus::Fine => 160,
            TimeStatus::FineBackupSteering => 170,
            TimeStatus::FineSteering => 180,
            TimeStatus::SatTime => 200,
        }
    }

    /// The name used in ASCII headers.
    pub fn name(self) -> &'static str {
        match self {
            TimeStatus::Unknown => "UNKNOWN",
            TimeStatus::Approximate => "APPROXIMATE",
            TimeStatus::CoarseAdjusting => "COARSEADJUSTING",
            TimeStatus::Coarse => "COARSE",
            TimeStatus::CoarseSteering => "COARSESTEERING",
            TimeStatus::FreeWheeling => "FREEWHEELING",
            TimeStatus::FineAdjusting => "FINEADJUSTING",
            TimeStatus::Fine => "FINE",
            TimeStatus::FineBackupSteering => "FINEBACKUPSTEERING",
            TimeStatus::FineSteering => "FINESTEERING",
            TimeStatus::SatTime => "SATTIME",
        }
    }

    /// Parse an ASCII header token.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UNKNOWN" => TimeStatus::Unknown,
            "APPROXIMATE" => TimeStatus::Approximate,
            "COARSEADJUSTING" => TimeStatus::CoarseAdjusting,
            "COARSE" => TimeStatus::Coarse,
            "COARSESTEERING" => TimeStatus::CoarseSteering,
            "FREEWHEELING" => TimeStatus::FreeWheeling,
            "FINEADJUSTING" => TimeStatus::FineAdjusting,
            "FINE" => TimeStatus::Fine,
            "FINEBACKUPSTEERING" => TimeStatus::FineBackupSteering,
            "FINESTEERING" => TimeStatus::FineSteering,
            "SATTIME" => TimeStatus::SatTime,
            _ => return None,
        })
    }
}

impl fmt::Display for TimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which antenna chain produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementSource {
    #[default]
    Primary,
    Secondary,
    Unknown,
}

impl fmt::Display for MeasurementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementSource::Primary => "PRIMARY",
            MeasurementSource::Secondary => "SECONDARY",
            MeasurementSource::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// Routing metadata for one framed message.
///
/// Week, milliseconds and time status default to zero/`UNKNOWN` for formats
/// that do not carry them (NMEA). `message_length` is always the exact span
/// consumed from the input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageMetadata {
    pub message_id: u16,
    pub message_name: String,
    pub format: HeaderFormat,
    pub measurement_source: MeasurementSource,
    pub gps_week: u16,
    /// Milliseconds of week
    pub milliseconds: f64,
    pub time_status: TimeStatus,
    /// Command reply rather than an unsolicited log
    pub response: bool,
    pub header_length: u32,
    /// Full frame length: header + body + CRC
    pub message_length: u32,
    /// Fingerprint of the message definition used to decode
    pub message_definition_crc: u32,

    // Header fields carried through so re-encoding does not invent them.
    pub port_address: u8,
    pub sequence: u16,
    /// Idle time in 0.5 percent units
    pub idle_time: u8,
    pub receiver_status: u32,
    pub receiver_sw_version: u16,
}

impl MessageMetadata {
    /// Number of seconds of week, as printed in ASCII headers.
    pub fn seconds(&self) -> f64 {
        self.milliseconds / 1000.0
    }
}

/// One re-encoded message in the pipeline output buffer.
///
/// Holds the whole message plus the header and body spans within it.
/// Contents are valid until the next `Parser::read`.
#[derive(Debug, Clone, Default)]
pub struct MessageData {
    bytes: Vec<u8>,
    header: Range<usize>,
    body: Range<usize>,
}

impl MessageData {
    /// Replace the contents with a new encoded message.
    pub(crate) fn fill(&mut self, bytes: &[u8], header: Range<usize>, body: Range<usize>) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        self.header = header;
        self.body = body;
    }

    /// The whole encoded message.
    pub fn message(&self) -> &[u8] {
        &self.bytes
    }

    /// The header region of the encoded message.
    pub fn header(&self) -> &[u8] {
        &self.bytes[self.header.clone()]
    }

    /// The body region of the encoded message.
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.body.clone()]
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no message.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
