// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error and status types for the transcode pipeline.
//!
//! Fallible internals return [`TranscodeError`] through the crate-wide
//! [`Result`]; the pipeline facade folds errors into [`Status`] codes so
//! that `read` never throws.

use std::fmt;

/// Result of one `Parser::read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A message was framed, decoded, filtered in and re-encoded.
    Success,
    /// An unknown-byte run is available (when the option is enabled).
    Unknown,
    /// The framer needs more input.
    BufferEmpty,
    /// The frame parsed but its message ID has no database entry.
    NoDefinition,
    /// Structural parse failure inside a framed message.
    MalformedInput,
    /// RANGECMP decompression failed.
    DecompressionFailure,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::Unknown => "UNKNOWN",
            Status::BufferEmpty => "BUFFER_EMPTY",
            Status::NoDefinition => "NO_DEFINITION",
            Status::MalformedInput => "MALFORMED_INPUT",
            Status::DecompressionFailure => "DECOMPRESSION_FAILURE",
        };
        write!(f, "{name}")
    }
}

/// Errors that can occur while framing, decoding or encoding a message.
#[derive(Debug, Clone)]
pub enum TranscodeError {
    /// Structural parse error in a frame, header or body
    Malformed {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Message ID or name not present in the definition database
    NoDefinition {
        /// Numeric message ID (0 when looked up by name)
        message_id: u32,
        /// Message name when known
        message_name: String,
    },

    /// Read past the end of a frame region
    BufferTooShort {
        /// Requested bytes
        requested: usize,
        /// Available bytes
        available: usize,
        /// Cursor position when the error occurred
        offset: usize,
    },

    /// Encoded output would exceed the fixed output capacity
    BufferFull {
        /// Bytes the encoder needed
        needed: usize,
        /// Output buffer capacity
        capacity: usize,
    },

    /// Failed to decode a specific field
    FieldDecode {
        /// Field name
        field_name: String,
        /// Field type
        field_type: String,
        /// Underlying error
        cause: String,
    },

    /// RANGECMP decompression failure
    Decompression {
        /// Error message
        message: String,
    },

    /// The message definition database could not be parsed
    InvalidDatabase {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Unsupported format or configuration
    Unsupported {
        /// What is not supported
        feature: String,
    },
}

impl TranscodeError {
    /// Create a structural parse error.
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        TranscodeError::Malformed {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a "no definition" error.
    pub fn no_definition(message_id: u32, message_name: impl Into<String>) -> Self {
        TranscodeError::NoDefinition {
            message_id,
            message_name: message_name.into(),
        }
    }

    /// Create a buffer too short error.
    pub fn buffer_too_short(requested: usize, available: usize, offset: usize) -> Self {
        TranscodeError::BufferTooShort {
            requested,
            available,
            offset,
        }
    }

    /// Create an output buffer overflow error.
    pub fn buffer_full(needed: usize, capacity: usize) -> Self {
        TranscodeError::BufferFull { needed, capacity }
    }

    /// Create a field decode error.
    pub fn field_decode(
        field_name: impl Into<String>,
        field_type: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        TranscodeError::FieldDecode {
            field_name: field_name.into(),
            field_type: field_type.into(),
            cause: cause.into(),
        }
    }

    /// Create a decompression error.
    pub fn decompression(message: impl Into<String>) -> Self {
        TranscodeError::Decompression {
            message: message.into(),
        }
    }

    /// Create a database parse error.
    pub fn invalid_database(context: impl Into<String>, message: impl Into<String>) -> Self {
        TranscodeError::InvalidDatabase {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        TranscodeError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Map this error to the status code `Parser::read` reports.
    pub fn status(&self) -> Status {
        match self {
            TranscodeError::NoDefinition { .. } => Status::NoDefinition,
            TranscodeError::Decompression { .. } => Status::DecompressionFailure,
            _ => Status::MalformedInput,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TranscodeError::Malformed { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            TranscodeError::NoDefinition {
                message_id,
                message_name,
            } => vec![
                ("message_id", message_id.to_string()),
                ("message_name", message_name.clone()),
            ],
            TranscodeError::BufferTooShort {
                requested,
                available,
                offset,
            } => vec![
                ("requested", requested.to_string()),
                ("available", available.to_string()),
                ("offset", offset.to_string()),
            ],
            TranscodeError::BufferFull { needed, capacity } => vec![
                ("needed", needed.to_string()),
                ("capacity", capacity.to_string()),
            ],
            TranscodeError::FieldDecode {
                field_name,
                field_type,
                cause,
            } => vec![
                ("field", field_name.clone()),
                ("type", field_type.clone()),
                ("cause", cause.clone()),
            ],
            TranscodeError::Decompression { message } => vec![("message", message.clone())],
            TranscodeError::InvalidDatabase { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            TranscodeError::Unsupported { feature } => vec![("feature", feature.clone())],
        }
    }
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::Malformed { context, message } => {
                write!(f, "Malformed {context}: {message}")
            }
            TranscodeError::NoDefinition {
                message_id,
                message_name,
            } => {
                if message_name.is_empty() {
                    write!(f, "No definition for message ID {message_id}")
                } else {
                    write!(f, "No definition for message '{message_name}'")
                }
            }
            TranscodeError::BufferTooShort {
                requested,
                available,
                offset,
            } => write!(
                f,
                "Buffer too short: requested {requested} bytes at offset {offset}, but only {available} bytes available"
            ),
            TranscodeError::BufferFull { needed, capacity } => write!(
                f,
                "Encode buffer full: needed {needed} bytes, capacity is {capacity}"
            ),
            TranscodeError::FieldDecode {
                field_name,
                field_type,
                cause,
            } => write!(
                f,
                "Failed to decode field '{field_name}' (type: '{field_type}'): {cause}"
            ),
            TranscodeError::Decompression { message } => {
                write!(f, "Decompression failed: {message}")
            }
            TranscodeError::InvalidDatabase { context, message } => {
                write!(f, "Invalid message database in {context}: {message}")
            }
            TranscodeError::Unsupported { feature } => {
                write!(f, "Unsupported: '{feature}'")
            }
        }
    }
}

impl std::error::Error for TranscodeError {}

impl From<std::io::Error> for TranscodeError {
    fn from(err: std::io::Error) -> Self {
        TranscodeError::Malformed {
            context: "IO".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for oemcodec operations.
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_error() {
        let err = TranscodeError::malformed("ascii header", "missing token");
        assert!(matches!(err, TranscodeError::Malformed { .. }));
        assert_eq!(err.to_string(), "Malformed ascii header: missing token");
        assert_eq!(err.status(), Status::MalformedInput);
    }

    #[test]
    fn test_no_definition_error() {
        let err = TranscodeError::no_definition(9999, "");
        assert_eq!(err.to_string(), "No definition for message ID 9999");
        assert_eq!(err.status(), Status::NoDefinition);

        let err = TranscodeError::no_definition(0, "BESTPOS");
        assert_eq!(err.to_string(), "No definition for message 'BESTPOS'");
    }

    #[test]
    fn test_buffer_too_short_error() {
        let err = TranscodeError::buffer_too_short(8, 3, 20);
        assert_eq!(
            err.to_string(),
            "Buffer too short: requested 8 bytes at offset 20, but only 3 bytes available"
        );
        assert_eq!(err.status(), Status::MalformedInput);
    }

    #[test]
    fn test_buffer_full_error() {
        let err = TranscodeError::buffer_full(40000, 32768);
        assert_eq!(
            err.to_string(),
            "Encode buffer full: needed 40000 bytes, capacity is 32768"
        );
    }

    #[test]
    fn test_decompression_error() {
        let err = TranscodeError::decompression("record truncated");
        assert_eq!(err.status(), Status::DecompressionFailure);
        assert_eq!(err.to_string(), "Decompression failed: record truncated");
    }

    #[test]
    fn test_field_decode_error() {
        let err = TranscodeError::field_decode("latitude", "double", "invalid digit");
        assert_eq!(
            err.to_string(),
            "Failed to decode field 'latitude' (type: 'double'): invalid digit"
        );
        let fields = err.log_fields();
        assert_eq!(fields[0], ("field", "latitude".to_string()));
        assert_eq!(fields[1], ("type", "double".to_string()));
    }

    #[test]
    fn test_log_fields_buffer_too_short() {
        let err = TranscodeError::buffer_too_short(8, 3, 20);
        let fields = err.log_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("requested", "8".to_string()));
        assert_eq!(fields[1], ("available", "3".to_string()));
        assert_eq!(fields[2], ("offset", "20".to_string()));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Success.to_string(), "SUCCESS");
        assert_eq!(Status::BufferEmpty.to_string(), "BUFFER_EMPTY");
        assert_eq!(Status::NoDefinition.to_string(), "NO_DEFINITION");
        assert_eq!(Status::MalformedInput.to_string(), "MALFORMED_INPUT");
        assert_eq!(
            Status::DecompressionFailure.to_string(),
            "DECOMPRESSION_FAILURE"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: TranscodeError = io_err.into();
        assert!(matches!(err, TranscodeError::Malformed { .. }));
    }
}
