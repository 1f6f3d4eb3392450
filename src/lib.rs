// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # oemcodec
//!
//! Streaming transcoder for NovAtel OEM receiver telemetry.
//!
//! Ingests a byte stream interleaving messages in the OEM wire formats
//! (binary, short binary, ASCII, short ASCII, abbreviated ASCII, NMEA),
//! frames and integrity-checks them, decodes each body against a schema
//! from a JSON message-definition database, optionally filters on metadata,
//! and re-encodes survivors into a caller-chosen target format.
//!
//! ## Architecture
//!
//! - `core/` - error/status types, the decoded field tree, CRC routines,
//!   wire-format tags and per-message metadata
//! - `database/` - the JSON message-definition database
//! - `framer/` - byte-level framing state machine
//! - `decode/` - header and body decoders, RANGECMP decompression
//! - `encode/` - ASCII / binary / flattened-binary / JSON encoder
//! - `filter` - metadata predicate pipeline
//! - `parser` - the write/read/flush pipeline facade
//!
//! ## Example: converting a stream to ASCII
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use oemcodec::{MessageData, MessageMetadata, MessageDatabase, Parser, Status};
//!
//! let db = Arc::new(MessageDatabase::from_file("messages.json")?);
//! let mut parser = Parser::new(db);
//!
//! let mut message = MessageData::default();
//! let mut metadata = MessageMetadata::default();
//! parser.write(&std::fs::read("receiver.gps")?);
//! loop {
//!     match parser.read(&mut message, &mut metadata) {
//!         Status::Success => println!("{}", metadata.message_name),
//!         Status::BufferEmpty => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod database;
pub mod decode;
pub mod encode;
pub mod filter;
pub mod framer;
pub mod parser;

pub use crate::core::{
    EncodeFormat, FieldTree, FieldValue, HeaderFormat, MeasurementSource, MessageData,
    MessageMetadata, NamedField, Result, Status, TimeStatus, TranscodeError,
    MAX_ASCII_MESSAGE_LENGTH, MAX_BINARY_MESSAGE_LENGTH,
};
pub use crate::database::{
    ArrayKind, DataType, FieldDescriptor, FieldLayout, MessageDatabase, MessageDefinition,
};
pub use crate::decode::BodyDecoder;
pub use crate::encode::Encoder;
pub use crate::filter::Filter;
pub use crate::framer::{Frame, Framer, FramerOutput};
pub use crate::parser::{Parser, ParserOptions};
