// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte-level framing of OEM message streams.
//!
//! The framer scans an unsynchronized byte stream for the sync sequences of
//! the supported wire formats, delimits one candidate message at a time and
//! verifies its integrity before emitting it. Bytes that belong to no frame
//! accumulate into unknown-byte runs. Every input byte lands in exactly one
//! frame or unknown run, in input order.
//!
//! A CRC mismatch is not an error: the candidate was not really a frame, so
//! only its first sync byte is consumed as unknown and scanning resumes one
//! byte later. Sync sequences embedded in garbage are still found this way.

use byteorder::{ByteOrder, LittleEndian};

use crate::core::crc::{crc32_block, nmea_checksum};
use crate::core::{HeaderFormat, MAX_ASCII_MESSAGE_LENGTH, MAX_BINARY_MESSAGE_LENGTH};

/// First two bytes of both binary sync sequences.
pub const BINARY_SYNC1: u8 = 0xAA;
pub const BINARY_SYNC2: u8 = 0x44;
/// Third sync byte selecting the long binary format.
pub const BINARY_SYNC3: u8 = 0x12;
/// Third sync byte selecting the short binary format.
pub const SHORT_BINARY_SYNC3: u8 = 0x13;

pub const ASCII_SYNC: u8 = b'#';
pub const SHORT_ASCII_SYNC: u8 = b'%';
pub const ABB_ASCII_SYNC: u8 = b'<';
pub const ABB_ASCII_PROMPT_SYNC: u8 = b'[';
pub const NMEA_SYNC: u8 = b'$';

/// Header terminator for the framed ASCII formats.
pub const ASCII_HEADER_TERMINATOR: u8 = b';';
/// Checksum delimiter for ASCII and NMEA.
pub const ASCII_CRC_DELIMITER: u8 = b'*';

/// Fixed header length of the long binary format.
pub const BINARY_HEADER_LENGTH: usize = 28;
/// Fixed header length of the short binary format.
pub const SHORT_BINARY_HEADER_LENGTH: usize = 12;
/// Trailing CRC length of the binary formats.
pub const BINARY_CRC_LENGTH: usize = 4;

/// NMEA sentences are short; anything longer is not a sentence.
const NMEA_MESSAGE_MAX_LENGTH: usize = 256;

/// One integrity-verified frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Wire format detected from the sync sequence
    pub format: HeaderFormat,
    /// The exact bytes of the frame, sync through checksum
    pub data: Vec<u8>,
    /// Command reply (abbreviated-ASCII `OK`/`ERROR` bodies and port
    /// prompts); binary response flags are decoded from the header later
    pub response: bool,
}

/// One framing decision.
#[derive(Debug, Clone, PartialEq)]
pub enum FramerOutput {
    /// An integrity-verified frame
    Frame(Frame),
    /// A run of bytes that belongs to no frame
    Unknown(Vec<u8>),
    /// More input is needed before anything can be decided
    NeedMore,
}

/// Outcome of probing the buffer head for a frame.
enum Candidate {
    /// The head byte cannot start a frame
    NotSync,
    /// A frame may start here but more bytes are needed
    Incomplete,
    /// A sync sequence was found but the candidate failed validation
    Invalid,
    /// A complete, verified frame of `len` bytes
    Complete {
        format: HeaderFormat,
        len: usize,
        response: bool,
    },
}

/// Streaming framer over an internal append-only buffer.
#[derive(Debug, Default)]
pub struct Framer {
    buffer: Vec<u8>,
    /// Scan cursor; bytes before it have been consumed
    pos: usize,
    /// Unknown bytes accumulated since the last emission
    unknown: Vec<u8>,
}

impl Framer {
    /// Create an idle framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more input.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Deliver the next framing decision.
    ///
    /// Consecutive unknown bytes are coalesced into a single run, emitted
    /// before the frame that follows them so outputs stay in input order.
    pub fn next(&mut self) -> FramerOutput {
        self.compact();

        loop {
            let head = &self.buffer[self.pos..];
            if head.is_empty() {
                break;
            }
            match probe(head) {
                Candidate::NotSync | Candidate::Invalid => {
                    // Consume exactly the head byte so a sync sequence
                    // embedded later in the candidate is still found.
                    self.unknown.push(head[0]);
                    self.pos += 1;
                }
                Candidate::Incomplete => {
                    if !self.unknown.is_empty() {
                        return FramerOutput::Unknown(std::mem::take(&mut self.unknown));
                    }
                    return FramerOutput::NeedMore;
                }
                Candidate::Complete {
                    format,
                    len,
                    response,
                } => {
                    if !self.unknown.is_empty() {
                        // The frame stays buffered; the next call re-frames it.
                        return FramerOutput::Unknown(std::mem::take(&mut self.unknown));
                    }
                    let data = head[..len].to_vec();
                    self.pos += len;
                    return FramerOutput::Frame(Frame {
                        format,
                        data,
                        response,
                    });
                }
            }
        }

        if !self.unknown.is_empty() {
            return FramerOutput::Unknown(std::mem::take(&mut self.unknown));
        }
        FramerOutput::NeedMore
    }

    /// Drain all buffered bytes and return to idle.
    ///
    /// Returns pending unknown bytes followed by unconsumed input, in input
    /// order.
    pub fn flush(&mut self) -> Vec<u8> {
        self.compact();
        let mut drained = std::mem::take(&mut self.unknown);
        drained.append(&mut self.buffer);
        self.pos = 0;
        drained
    }

    /// Reclaim consumed bytes at the front of the buffer.
    fn compact(&mut self) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
    }
}

/// Probe the buffer head for a frame candidate.
fn probe(buf: &[u8]) -> Candidate {
    match buf[0] {
        BINARY_SYNC1 => probe_binary(buf),
        ASCII_SYNC => probe_delimited_ascii(buf, HeaderFormat::Ascii),
        SHORT_ASCII_SYNC => probe_delimited_ascii(buf, HeaderFormat::ShortAscii),
        NMEA_SYNC => probe_nmea(buf),
        ABB_ASCII_SYNC | ABB_ASCII_PROMPT_SYNC => probe_abbreviated(buf),
        _ => Candidate::NotSync,
    }
}

fn probe_binary(buf: &[u8]) -> Candidate {
    if buf.len() < 3 {
        return Candidate::Incomplete;
    }
    if buf[1] != BINARY_SYNC2 {
        return Candidate::NotSync;
    }
    match buf[2] {
        BINARY_SYNC3 => probe_long_binary(buf),
        SHORT_BINARY_SYNC3 => probe_short_binary(buf),
        _ => Candidate::NotSync,
    }
}

fn probe_long_binary(buf: &[u8]) -> Candidate {
    if buf.len() < 10 {
        return Candidate::Incomplete;
    }
    let header_length = buf[3] as usize;
    if header_length < BINARY_HEADER_LENGTH {
        return Candidate::Invalid;
    }
    let message_length = LittleEndian::read_u16(&buf[8..10]) as usize;
    let total = header_length + message_length + BINARY_CRC_LENGTH;
    if total > MAX_BINARY_MESSAGE_LENGTH {
        return Candidate::Invalid;
    }
    verify_binary(buf, HeaderFormat::Binary, total)
}

fn probe_short_binary(buf: &[u8]) -> Candidate {
    if buf.len() < 4 {
        return Candidate::Incomplete;
    }
    let message_length = buf[3] as usize;
    let total = SHORT_BINARY_HEADER_LENGTH + message_length + BINARY_CRC_LENGTH;
    verify_binary(buf, HeaderFormat::ShortBinary, total)
}

fn verify_binary(buf: &[u8], format: HeaderFormat, total: usize) -> Candidate {
    if buf.len() < total {
        return Candidate::Incomplete;
    }
    let expected = LittleEndian::read_u32(&buf[total - BINARY_CRC_LENGTH..total]);
    if crc32_block(0, &buf[..total - BINARY_CRC_LENGTH]) != expected {
        return Candidate::Invalid;
    }
    Candidate::Complete {
        format,
        len: total,
        response: false,
    }
}

fn probe_delimited_ascii(buf: &[u8], format: HeaderFormat) -> Candidate {
    let star = match find_delimiter(buf, MAX_ASCII_MESSAGE_LENGTH) {
        Ok(star) => star,
        Err(candidate) => return candidate,
    };
    // 8 hex CRC digits plus CRLF follow the delimiter.
    let total = star + 1 + 8 + 2;
    if buf.len() < total {
        return Candidate::Incomplete;
    }
    let expected = match parse_hex_u32(&buf[star + 1..star + 9]) {
        Some(crc) => crc,
        None => return Candidate::Invalid,
    };
    if &buf[star + 9..total] != b"\r\n" {
        return Candidate::Invalid;
    }
    if crc32_block(0, &buf[1..star]) != expected {
        return Candidate::Invalid;
    }
    Candidate::Complete {
        format,
        len: total,
        response: false,
    }
}

fn probe_nmea(buf: &[u8]) -> Candidate {
    let star = match find_delimiter(buf, NMEA_MESSAGE_MAX_LENGTH) {
        Ok(star) => star,
        Err(candidate) => return candidate,
    };
    let total = star + 1 + 2 + 2;
    if buf.len() < total {
        return Candidate::Incomplete;
    }
    let expected = match parse_hex_u32(&buf[star + 1..star + 3]) {
        Some(ck) => ck as u8,
        None => return Candidate::Invalid,
    };
    if &buf[star + 3..total] != b"\r\n" {
        return Candidate::Invalid;
    }
    if nmea_checksum(&buf[1..star]) != expected {
        return Candidate::Invalid;
    }
    Candidate::Complete {
        format: HeaderFormat::Nmea,
        len: total,
        response: false,
    }
}

/// Find the `*` checksum delimiter, bounded by `limit`.
fn find_delimiter(buf: &[u8], limit: usize) -> std::result::Result<usize, Candidate> {
    let end = buf.len().min(limit);
    for (i, &byte) in buf[1..end].iter().enumerate() {
        if byte == ASCII_CRC_DELIMITER {
            return Ok(i + 1);
        }
    }
    if buf.len() >= limit {
        Err(Candidate::Invalid)
    } else {
        Err(Candidate::Incomplete)
    }
}

fn probe_abbreviated(buf: &[u8]) -> Candidate {
    if buf.len() < 2 {
        return Candidate::Incomplete;
    }
    if !buf[1].is_ascii_alphabetic() {
        return Candidate::Invalid;
    }
    // No checksum; the frame ends where the next sync sequence begins.
    let mut i = 1;
    while i < buf.len() {
        if let Some(confirmed) = boundary_at(buf, i) {
            if confirmed {
                return complete_abbreviated(buf, i);
            }
            // A possible boundary at the end of the buffer; wait for the
            // bytes that confirm or refute it.
            return Candidate::Incomplete;
        }
        i += 1;
    }
    if buf.len() >= MAX_ASCII_MESSAGE_LENGTH {
        return Candidate::Invalid;
    }
    Candidate::Incomplete
}

fn complete_abbreviated(buf: &[u8], len: usize) -> Candidate {
    // Responses are `OK`/`ERROR` bodies and `[PORT]` prompts.
    let response = buf[0] == ABB_ASCII_PROMPT_SYNC
        || buf[1..len].starts_with(b"OK")
        || buf[1..len].starts_with(b"ERROR");
    Candidate::Complete {
        format: HeaderFormat::AbbAscii,
        len,
        response,
    }
}

/// Check whether a new frame could begin at `i`.
///
/// Returns `Some(true)` for a confirmed boundary, `Some(false)` when the
/// buffer ends before the boundary can be confirmed, `None` otherwise.
/// ASCII syncs only bound a frame at the start of a line; a `<` followed by
/// whitespace is a continuation line, not a boundary.
fn boundary_at(buf: &[u8], i: usize) -> Option<bool> {
    match buf[i] {
        BINARY_SYNC1 => {
            if buf.len() < i + 3 {
                return Some(false);
            }
            if buf[i + 1] == BINARY_SYNC2
                && (buf[i + 2] == BINARY_SYNC3 || buf[i + 2] == SHORT_BINARY_SYNC3)
            {
                return Some(true);
            }
            None
        }
        ASCII_SYNC | SHORT_ASCII_SYNC | NMEA_SYNC | ABB_ASCII_PROMPT_SYNC
            if i > 0 && buf[i - 1] == b'\n' =>
        {
            Some(true)
        }
        ABB_ASCII_SYNC if i > 0 && buf[i - 1] == b'\n' => {
            if buf.len() < i + 2 {
                return Some(false);
            }
            if buf[i + 1].is_ascii_alphabetic() {
                Some(true)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_hex_u32(digits: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, 16).ok()
}
