// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The decoded field tree.
//!
//! A decoded message body is an ordered sequence of named fields. Order is
//! load-bearing: the encoders walk the tree in schema order, so the tree is
//! a `Vec` rather than a map.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A decoded message body: named fields in schema order.
pub type FieldTree = Vec<NamedField>;

/// One decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedField {
    /// Field name from the message definition
    pub name: String,
    /// Decoded value
    pub value: FieldValue,
}

impl NamedField {
    /// Create a named field.
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A decoded field value.
///
/// Covers every data type the message definition database can describe:
/// integer widths 1/2/4/8, floats, bool, enums with their symbolic name,
/// character data, raw hex bytes, homogeneous arrays and nested structs.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),

    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),

    Float32(f32),
    Float64(f64),

    /// Enum value with its symbolic name from the nested enum definition
    Enum {
        value: u32,
        label: String,
    },

    /// Character data (fixed, variable or NUL-terminated on the wire)
    String(String),

    /// Raw hex-encoded bytes
    Hex(Vec<u8>),

    /// Homogeneous sequence
    Array(Vec<FieldValue>),

    /// Nested field tree
    Struct(FieldTree),
}

impl FieldValue {
    /// Check if this value is a scalar (not an array or struct).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Array(_) | FieldValue::Struct(_))
    }

    /// Check if this value is an integer type (signed or unsigned).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldValue::Int8(_)
                | FieldValue::Int16(_)
                | FieldValue::Int32(_)
                | FieldValue::Int64(_)
                | FieldValue::UInt8(_)
                | FieldValue::UInt16(_)
                | FieldValue::UInt32(_)
                | FieldValue::UInt64(_)
        )
    }

    /// Try to convert this value to f64 (numeric values only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int8(v) => Some(*v as f64),
            FieldValue::Int16(v) => Some(*v as f64),
            FieldValue::Int32(v) => Some(*v as f64),
            FieldValue::Int64(v) => Some(*v as f64),
            FieldValue::UInt8(v) => Some(*v as f64),
            FieldValue::UInt16(v) => Some(*v as f64),
            FieldValue::UInt32(v) => Some(*v as f64),
            FieldValue::UInt64(v) => Some(*v as f64),
            FieldValue::Float32(v) => Some(*v as f64),
            FieldValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert this value to u64 (unsigned integers and enums).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            FieldValue::Enum { value, .. } => Some(*value as u64),
            _ => None,
        }
    }

    /// Try to get the inner string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the inner array.
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Try to get the inner struct.
    pub fn as_struct(&self) -> Option<&FieldTree> {
        match self {
            FieldValue::Struct(tree) => Some(tree),
            _ => None,
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int8(_) => "char",
            FieldValue::Int16(_) => "short",
            FieldValue::Int32(_) => "long",
            FieldValue::Int64(_) => "longlong",
            FieldValue::UInt8(_) => "uchar",
            FieldValue::UInt16(_) => "ushort",
            FieldValue::UInt32(_) => "ulong",
            FieldValue::UInt64(_) => "ulonglong",
            FieldValue::Float32(_) => "float",
            FieldValue::Float64(_) => "double",
            FieldValue::Enum { .. } => "enum",
            FieldValue::String(_) => "string",
            FieldValue::Hex(_) => "hexbyte",
            FieldValue::Array(_) => "array",
            FieldValue::Struct(_) => "struct",
        }
    }
}

/// Find a field by name in a tree.
///
/// Linear scan; trees are small and ordered, so a map buys nothing.
pub fn find_field<'a>(tree: &'a FieldTree, name: &str) -> Option<&'a FieldValue> {
    tree.iter().find(|f| f.name == name).map(|f| &f.value)
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::Int16(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Float32(v) => write!(f, "{v}"),
            FieldValue::Float64(v) => write!(f, "{v}"),
            FieldValue::Enum { label, .. } => write!(f, "{label}"),
            FieldValue::String(v) => write!(f, "\"{v}\""),
            FieldValue::Hex(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            FieldValue::Array(v) => write!(f, "[{} elements]", v.len()),
            FieldValue::Struct(v) => write!(f, "{{{} fields}}", v.len()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::Int8(v) => serializer.serialize_i8(*v),
            FieldValue::Int16(v) => serializer.serialize_i16(*v),
            FieldValue::Int32(v) => serializer.serialize_i32(*v),
            FieldValue::Int64(v) => serializer.serialize_i64(*v),
            FieldValue::UInt8(v) => serializer.serialize_u8(*v),
            FieldValue::UInt16(v) => serializer.serialize_u16(*v),
            FieldValue::UInt32(v) => serializer.serialize_u32(*v),
            FieldValue::UInt64(v) => serializer.serialize_u64(*v),
            FieldValue::Float32(v) => serializer.serialize_f32(*v),
            FieldValue::Float64(v) => serializer.serialize_f64(*v),
            FieldValue::Enum { label, .. } => serializer.serialize_str(label),
            FieldValue::String(v) => serializer.serialize_str(v),
            FieldValue::Hex(v) => {
                let hex: String = v.iter().map(|b| format!("{b:02x}")).collect();
                serializer.serialize_str(&hex)
            }
            FieldValue::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            FieldValue::Struct(tree) => {
                let mut map = serializer.serialize_map(Some(tree.len()))?;
                for field in tree {
                    map.serialize_entry(&field.name, &field.value)?;
                }
                map.end()
            }
        }
    }
}
