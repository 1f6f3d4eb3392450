// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types shared by every stage of the transcode pipeline.
//!
//! - [`error`] - error and status types
//! - [`value`] - the decoded field tree
//! - [`crc`] - CRC-32 and NMEA checksum routines
//! - [`metadata`] - wire-format tags and per-message metadata

pub mod crc;
pub mod error;
pub mod metadata;
pub mod value;

pub use crc::{crc32_block, crc32_update, nmea_checksum};
pub use error::{Result, Status, TranscodeError};
pub use metadata::{
    EncodeFormat, HeaderFormat, MeasurementSource, MessageData, MessageMetadata, TimeStatus,
    MAX_ASCII_MESSAGE_LENGTH, MAX_BINARY_MESSAGE_LENGTH,
};
pub use value::{find_field, FieldTree, FieldValue, NamedField};
