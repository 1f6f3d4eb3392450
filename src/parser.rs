// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The transcode pipeline facade.
//!
//! [`Parser`] glues the framer, header decoder, body decoder, filter and
//! encoder into a push/pull loop: `write` feeds bytes in, `read` pulls the
//! next decoded-then-re-encoded message out as a [`Status`] plus output
//! buffers. Single-threaded cooperative: every call runs to completion on
//! the caller's thread, and a parser that needs more input reports
//! `BufferEmpty` instead of blocking.

use std::sync::Arc;

use tracing::debug;

use crate::core::{
    EncodeFormat, HeaderFormat, MessageData, MessageMetadata, Result, Status, TranscodeError,
};
use crate::database::MessageDatabase;
use crate::decode::{body::BodyDecoder, decode_header, decompress_rangecmp};
use crate::encode::Encoder;
use crate::filter::Filter;
use crate::framer::{Frame, Framer, FramerOutput, BINARY_CRC_LENGTH};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Drop abbreviated-ASCII command replies
    pub ignore_abbreviated_ascii_responses: bool,
    /// Rewrite RANGECMP messages to RANGE before encoding
    pub decompress_rangecmp: bool,
    /// Surface unknown-byte runs as `UNKNOWN` instead of discarding them
    pub return_unknown_bytes: bool,
    /// Target format for re-encoding
    pub encode_format: EncodeFormat,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            ignore_abbreviated_ascii_responses: true,
            decompress_rangecmp: false,
            return_unknown_bytes: false,
            encode_format: EncodeFormat::Ascii,
        }
    }
}

/// Streaming transcode pipeline over a shared message database.
///
/// The database is immutable once the parser is built; separate parsers
/// sharing one database may run on different threads without
/// synchronization.
pub struct Parser {
    db: Arc<MessageDatabase>,
    framer: Framer,
    filter: Option<Filter>,
    options: ParserOptions,
}

impl Parser {
    /// Create a parser with default options.
    pub fn new(db: Arc<MessageDatabase>) -> Self {
        Self {
            db,
            framer: Framer::new(),
            filter: None,
            options: ParserOptions::default(),
        }
    }

    /// Create a parser with the given options.
    ///
    /// Rejects `EncodeFormat::Unspecified` at configuration time.
    pub fn with_options(db: Arc<MessageDatabase>, options: ParserOptions) -> Result<Self> {
        if options.encode_format == EncodeFormat::Unspecified {
            return Err(TranscodeError::unsupported(
                "UNSPECIFIED is not a valid encode format",
            ));
        }
        Ok(Self {
            db,
            framer: Framer::new(),
            filter: None,
            options,
        })
    }

    /// Attach a filter. Messages it rejects are consumed silently.
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = Some(filter);
    }

    /// Detach the filter.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Change the target encode format.
    pub fn set_encode_format(&mut self, format: EncodeFormat) -> Result<()> {
        if format == EncodeFormat::Unspecified {
            return Err(TranscodeError::unsupported(
                "UNSPECIFIED is not a valid encode format",
            ));
        }
        self.options.encode_format = format;
        Ok(())
    }

    /// The current options.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Toggle surfacing of unknown-byte runs.
    pub fn set_return_unknown_bytes(&mut self, enabled: bool) {
        self.options.return_unknown_bytes = enabled;
    }

    /// Toggle RANGECMP decompression.
    pub fn set_decompress_rangecmp(&mut self, enabled: bool) {
        self.options.decompress_rangecmp = enabled;
    }

    /// Toggle dropping of abbreviated-ASCII command replies.
    pub fn set_ignore_abbreviated_ascii_responses(&mut self, enabled: bool) {
        self.options.ignore_abbreviated_ascii_responses = enabled;
    }

    /// Push bytes into the pipeline. Returns the number of bytes accepted.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.framer.append(bytes);
        bytes.len()
    }

    /// Pull the next message out of the pipeline.
    ///
    /// On `Success` the re-encoded message is in `message`; on `Unknown`
    /// the unknown-byte run is. On `NoDefinition` the raw frame is returned
    /// with the metadata populated from its header. Both buffers are
    /// overwritten by the next call.
    pub fn read(&mut self, message: &mut MessageData, metadata: &mut MessageMetadata) -> Status {
        loop {
            match self.framer.next() {
                FramerOutput::NeedMore => return Status::BufferEmpty,
                FramerOutput::Unknown(run) => {
                    if self.options.return_unknown_bytes {
                        *metadata = MessageMetadata {
                            format: HeaderFormat::Unknown,
                            message_length: run.len() as u32,
                            ..Default::default()
                        };
                        message.fill(&run, 0..0, 0..run.len());
                        return Status::Unknown;
                    }
                }
                FramerOutput::Frame(frame) => {
                    match self.process_frame(&frame, message, metadata) {
                        Ok(Some(status)) => return status,
                        Ok(None) => {} // filtered out or ignored; keep going
                        Err(error) => {
                            debug!(error = %error, "frame dropped");
                            return error.status();
                        }
                    }
                }
            }
        }
    }

    /// Drain the internal byte buffer and reset framing.
    ///
    /// Returns the number of bytes drained; the bytes themselves are
    /// appended to `out` when a buffer is provided.
    pub fn flush(&mut self, out: Option<&mut Vec<u8>>) -> usize {
        let drained = self.framer.flush();
        let count = drained.len();
        if let Some(out) = out {
            out.extend_from_slice(&drained);
        }
        count
    }

    /// Process one verified frame; `Ok(None)` means it was consumed without
    /// producing output.
    fn process_frame(
        &mut self,
        frame: &Frame,
        message: &mut MessageData,
        metadata: &mut MessageMetadata,
    ) -> Result<Option<Status>> {
        let (mut meta, definition) = decode_header(frame, &self.db)?;

        if frame.format == HeaderFormat::AbbAscii
            && meta.response
            && self.options.ignore_abbreviated_ascii_responses
        {
            return Ok(None);
        }

        if let Some(filter) = &self.filter {
            if !filter.do_filtering(&meta) {
                return Ok(None);
            }
        }

        // NMEA sentences and surviving command replies have no message
        // definition to decode against; they pass through unmodified.
        if frame.format == HeaderFormat::Nmea
            || (meta.response && frame.format == HeaderFormat::AbbAscii)
        {
            let header_end = meta.header_length as usize;
            message.fill(&frame.data, 0..header_end, header_end..frame.data.len());
            *metadata = meta;
            return Ok(Some(Status::Success));
        }

        let Some(definition) = definition else {
            let header_end = (meta.header_length as usize).min(frame.data.len());
            message.fill(&frame.data, 0..header_end, header_end..frame.data.len());
            *metadata = meta;
            return Ok(Some(Status::NoDefinition));
        };

        let layout = definition.layout_for_crc16((meta.message_definition_crc & 0xFFFF) as u16);
        let body = body_region(frame, meta.header_length as usize);
        let tree = BodyDecoder::new(&self.db).decode(body, frame.format, &layout.fields)?;

        let (tree, fields) = if self.options.decompress_rangecmp
            && meta.message_name.starts_with("RANGECMP")
        {
            let (expanded, range) = decompress_rangecmp(&mut meta, &tree, &self.db)?;
            (expanded, range.latest().fields.clone())
        } else {
            (tree, layout.fields.clone())
        };

        let mut encoder = Encoder::new(&self.db);
        encoder.encode(&meta, &fields, &tree, self.options.encode_format, message)?;

        *metadata = meta;
        Ok(Some(Status::Success))
    }
}

/// The body span of a frame, given its decoded header length.
fn body_region(frame: &Frame, header_length: usize) -> &[u8] {
    let data = &frame.data;
    match frame.format {
        HeaderFormat::Binary | HeaderFormat::ShortBinary => {
            &data[header_length..data.len() - BINARY_CRC_LENGTH]
        }
        // '*' + 8 hex digits + CRLF trail the body.
        HeaderFormat::Ascii | HeaderFormat::ShortAscii => &data[header_length..data.len() - 11],
        _ => &data[header_length.min(data.len())..],
    }
}
