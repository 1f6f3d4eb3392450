// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Header and body decoding.
//!
//! - [`header`] - per-format header decoding into metadata
//! - [`body`] - schema-driven body decoding into a field tree
//! - [`rangecmp`] - RANGECMP observation decompression

pub mod body;
pub mod header;
pub mod rangecmp;

pub use body::BodyDecoder;
pub use header::{ascii_name, decode_header, port_address, port_name};
pub use rangecmp::decompress_rangecmp;
