// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Data model for the JSON message-definition database.
//!
//! The raw serde types mirror the JSON document; [`MessageDefinition`] and
//! [`FieldLayout`] are the indexed form the decoders and encoders walk.

use serde::Deserialize;

use crate::core::crc::crc32_block;
use crate::core::{HeaderFormat, MeasurementSource, Result, TranscodeError};

/// Top-level shape of the JSON database document.
///
/// The same shape is accepted by `append_messages`, so a patch document can
/// carry any subset of the three collections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseDocument {
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    #[serde(default)]
    pub structs: Vec<StructDefinition>,
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
}

/// A named enum with its value set.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<EnumValue>,
}

impl EnumDefinition {
    /// Resolve a wire value to its symbolic name.
    pub fn label_of(&self, value: u32) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }

    /// Resolve a symbolic name to its wire value.
    pub fn value_of(&self, label: &str) -> Option<u32> {
        self.values.iter().find(|v| v.name == label).map(|v| v.value)
    }
}

/// One enum member.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: u32,
}

/// A named struct shared between messages.
#[derive(Debug, Clone, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

/// One message entry as it appears in the JSON document.
///
/// `fields` is shorthand for a single layout; `layouts` carries versioned
/// field lists keyed by their definition CRC. An explicit empty `fields`
/// list is a body-less marker definition (NMEA sentences); an entry with
/// neither key is rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntry {
    pub name: String,
    #[serde(default)]
    pub id: u16,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldDescriptor>>,
    #[serde(default)]
    pub layouts: Vec<RawLayout>,
}

/// A versioned field layout as it appears in the JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLayout {
    #[serde(default)]
    pub crc: Option<u32>,
    pub fields: Vec<FieldDescriptor>,
}

/// One field in a message definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub array: Option<ArraySpec>,
    /// Enum name for `enum` fields
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    /// Inline nested fields for `struct` fields
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Named struct reference for `struct` fields
    #[serde(default, rename = "struct")]
    pub struct_name: Option<String>,
    /// Byte length for fixed `string` and `hexbyte` fields
    #[serde(default)]
    pub length: Option<usize>,
}

/// Array arity as it appears in the JSON document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArraySpec {
    /// `{"fixed": n}` - exactly n elements
    Fixed { fixed: usize },
    /// `{"variable": max}` - u32 count prefix, at most `max` elements
    Variable { variable: usize },
    /// `"terminated"` - read until the sentinel element
    Keyword(String),
}

/// Array arity in indexed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Not an array
    None,
    /// Exactly n elements
    Fixed(usize),
    /// Count-prefixed, with a maximum arity for flattened encoding
    Variable(usize),
    /// Elements until the zero sentinel
    Terminated,
}

impl FieldDescriptor {
    /// Resolve the declared array spec to an [`ArrayKind`].
    ///
    /// `length` is shorthand for a fixed run of `string` or `hexbyte`
    /// data; an explicit `array` spec takes precedence over it.
    pub fn array_kind(&self) -> Result<ArrayKind> {
        match &self.array {
            None => match self.length {
                None => Ok(ArrayKind::None),
                Some(length)
                    if matches!(self.data_type, DataType::String | DataType::HexByte) =>
                {
                    Ok(ArrayKind::Fixed(length))
                }
                Some(_) => Err(TranscodeError::invalid_database(
                    "field",
                    format!(
                        "'length' is only valid on string and hexbyte fields ('{}')",
                        self.name
                    ),
                )),
            },
            Some(ArraySpec::Fixed { fixed }) => Ok(ArrayKind::Fixed(*fixed)),
            Some(ArraySpec::Variable { variable }) => Ok(ArrayKind::Variable(*variable)),
            Some(ArraySpec::Keyword(word)) if word == "terminated" => Ok(ArrayKind::Terminated),
            Some(ArraySpec::Keyword(word)) => Err(TranscodeError::invalid_database(
                "field array",
                format!("unknown array kind '{word}' on field '{}'", self.name),
            )),
        }
    }
}

/// Wire data type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    #[serde(alias = "int")]
    Long,
    #[serde(alias = "uint")]
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Enum,
    String,
    HexByte,
    Struct,
}

impl DataType {
    /// Binary width of one element, when fixed.
    ///
    /// Bool and enum occupy four bytes on the OEM wire.
    pub fn binary_size(self) -> Option<usize> {
        match self {
            DataType::Char | DataType::UChar | DataType::HexByte => Some(1),
            DataType::Short | DataType::UShort => Some(2),
            DataType::Bool | DataType::Enum | DataType::Long | DataType::ULong | DataType::Float => {
                Some(4)
            }
            DataType::LongLong | DataType::ULongLong | DataType::Double => Some(8),
            DataType::String | DataType::Struct => None,
        }
    }

    /// The token used in the canonical serialization and in messages.
    pub fn token(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Char => "char",
            DataType::UChar => "uchar",
            DataType::Short => "short",
            DataType::UShort => "ushort",
            DataType::Long => "long",
            DataType::ULong => "ulong",
            DataType::LongLong => "longlong",
            DataType::ULongLong => "ulonglong",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Enum => "enum",
            DataType::String => "string",
            DataType::HexByte => "hexbyte",
            DataType::Struct => "struct",
        }
    }
}

/// One versioned field layout of a message, with its definition CRC.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    /// Deterministic fingerprint of this layout
    pub def_crc: u32,
    /// Fields in wire order
    pub fields: Vec<FieldDescriptor>,
}

impl FieldLayout {
    /// Build a layout, computing the definition CRC when the document did
    /// not pin one.
    pub fn new(fields: Vec<FieldDescriptor>, crc: Option<u32>) -> Self {
        let def_crc = crc.unwrap_or_else(|| definition_crc(&fields));
        Self { def_crc, fields }
    }
}

/// An indexed message definition.
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    pub id: u16,
    pub name: String,
    /// Format restriction; `All` matches any framing
    pub format: HeaderFormat,
    /// Source restriction; `None` matches any antenna chain
    pub source: Option<MeasurementSource>,
    /// Versioned layouts, oldest first; the last is the latest
    pub layouts: Vec<FieldLayout>,
}

impl MessageDefinition {
    /// The most recent field layout.
    pub fn latest(&self) -> &FieldLayout {
        self.layouts
            .last()
            .expect("a message definition always has at least one layout")
    }

    /// Resolve the layout whose definition CRC matches the 16-bit header
    /// field, falling back to the latest.
    pub fn layout_for_crc16(&self, crc16: u16) -> &FieldLayout {
        self.layouts
            .iter()
            .find(|l| (l.def_crc & 0xFFFF) as u16 == crc16)
            .unwrap_or_else(|| self.latest())
    }

    /// Whether this definition applies to a frame of the given format and
    /// source.
    pub fn matches(&self, format: HeaderFormat, source: MeasurementSource) -> bool {
        let format_ok = match self.format {
            HeaderFormat::All => format != HeaderFormat::Nmea,
            restricted => restricted == format,
        };
        let source_ok = self.source.is_none() || self.source == Some(source);
        format_ok && source_ok
    }
}

/// Compute the deterministic fingerprint of a field layout.
///
/// The canonical serialization is `name:type[:array][:enum|struct]` per
/// field, `;`-joined, with inline struct fields in parentheses.
pub fn definition_crc(fields: &[FieldDescriptor]) -> u32 {
    let mut canonical = String::new();
    write_canonical(fields, &mut canonical);
    crc32_block(0, canonical.as_bytes())
}

fn write_canonical(fields: &[FieldDescriptor], out: &mut String) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(&field.name);
        out.push(':');
        out.push_str(field.data_type.token());
        match &field.array {
            // A bare `length` means the same layout as a fixed array.
            None => {
                if let Some(length) = field.length {
                    out.push_str(&format!(":[{length}]"));
                }
            }
            Some(ArraySpec::Fixed { fixed }) => out.push_str(&format!(":[{fixed}]")),
            Some(ArraySpec::Variable { variable }) => out.push_str(&format!(":[..{variable}]")),
            Some(ArraySpec::Keyword(word)) => out.push_str(&format!(":[{word}]")),
        }
        if let Some(enum_name) = &field.enum_name {
            out.push(':');
            out.push_str(enum_name);
        }
        if let Some(struct_name) = &field.struct_name {
            out.push(':');
            out.push_str(struct_name);
        }
        if !field.fields.is_empty() {
            out.push_str(":(");
            write_canonical(&field.fields, out);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, data_type: DataType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            data_type,
            array: None,
            enum_name: None,
            fields: Vec::new(),
            struct_name: None,
            length: None,
        }
    }

    #[test]
    fn test_binary_sizes() {
        assert_eq!(DataType::UChar.binary_size(), Some(1));
        assert_eq!(DataType::UShort.binary_size(), Some(2));
        assert_eq!(DataType::Bool.binary_size(), Some(4));
        assert_eq!(DataType::Enum.binary_size(), Some(4));
        assert_eq!(DataType::Double.binary_size(), Some(8));
        assert_eq!(DataType::String.binary_size(), None);
        assert_eq!(DataType::Struct.binary_size(), None);
    }

    #[test]
    fn test_field_descriptor_deserialize() {
        let json = r#"{"name": "latitude", "type": "double"}"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field.name, "latitude");
        assert_eq!(field.data_type, DataType::Double);
        assert_eq!(field.array_kind().unwrap(), ArrayKind::None);
    }

    #[test]
    fn test_array_spec_deserialize() {
        let fixed: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "uchar", "array": {"fixed": 4}}"#)
                .unwrap();
        assert_eq!(fixed.array_kind().unwrap(), ArrayKind::Fixed(4));

        let variable: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "ulong", "array": {"variable": 325}}"#)
                .unwrap();
        assert_eq!(variable.array_kind().unwrap(), ArrayKind::Variable(325));

        let terminated: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "char", "array": "terminated"}"#)
                .unwrap();
        assert_eq!(terminated.array_kind().unwrap(), ArrayKind::Terminated);
    }

    #[test]
    fn test_array_spec_unknown_keyword() {
        let bad: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "char", "array": "ragged"}"#).unwrap();
        assert!(bad.array_kind().is_err());
    }

    #[test]
    fn test_length_shorthand_for_fixed_runs() {
        let station: FieldDescriptor =
            serde_json::from_str(r#"{"name": "station", "type": "string", "length": 4}"#).unwrap();
        assert_eq!(station.array_kind().unwrap(), ArrayKind::Fixed(4));

        let check: FieldDescriptor =
            serde_json::from_str(r#"{"name": "check", "type": "hexbyte", "length": 2}"#).unwrap();
        assert_eq!(check.array_kind().unwrap(), ArrayKind::Fixed(2));

        // Only character data takes the shorthand.
        let bad: FieldDescriptor =
            serde_json::from_str(r#"{"name": "count", "type": "ulong", "length": 2}"#).unwrap();
        assert!(bad.array_kind().is_err());

        // An explicit array spec wins over the shorthand.
        let both: FieldDescriptor = serde_json::from_str(
            r#"{"name": "raw", "type": "hexbyte", "length": 2, "array": {"fixed": 8}}"#,
        )
        .unwrap();
        assert_eq!(both.array_kind().unwrap(), ArrayKind::Fixed(8));
    }

    #[test]
    fn test_length_shorthand_enters_definition_crc() {
        let short: FieldDescriptor =
            serde_json::from_str(r#"{"name": "station", "type": "string", "length": 4}"#).unwrap();
        let long: FieldDescriptor =
            serde_json::from_str(r#"{"name": "station", "type": "string", "length": 8}"#).unwrap();
        assert_ne!(definition_crc(&[short.clone()]), definition_crc(&[long]));

        // The shorthand and the explicit fixed spec describe the same layout.
        let explicit: FieldDescriptor = serde_json::from_str(
            r#"{"name": "station", "type": "string", "array": {"fixed": 4}}"#,
        )
        .unwrap();
        assert_eq!(definition_crc(&[short]), definition_crc(&[explicit]));
    }

    #[test]
    fn test_data_type_aliases() {
        let int_field: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "int"}"#).unwrap();
        assert_eq!(int_field.data_type, DataType::Long);
        let uint_field: FieldDescriptor =
            serde_json::from_str(r#"{"name": "a", "type": "uint"}"#).unwrap();
        assert_eq!(uint_field.data_type, DataType::ULong);
    }

    #[test]
    fn test_definition_crc_deterministic() {
        let fields = vec![field("week", DataType::UShort), field("sec", DataType::Double)];
        assert_eq!(definition_crc(&fields), definition_crc(&fields.clone()));
    }

    #[test]
    fn test_definition_crc_sensitive_to_order_and_type() {
        let a = vec![field("week", DataType::UShort), field("sec", DataType::Double)];
        let b = vec![field("sec", DataType::Double), field("week", DataType::UShort)];
        assert_ne!(definition_crc(&a), definition_crc(&b));

        let c = vec![field("week", DataType::ULong), field("sec", DataType::Double)];
        assert_ne!(definition_crc(&a), definition_crc(&c));
    }

    #[test]
    fn test_layout_for_crc16() {
        let old = FieldLayout::new(vec![field("week", DataType::UShort)], None);
        let new = FieldLayout::new(
            vec![field("week", DataType::UShort), field("sec", DataType::Double)],
            None,
        );
        let old_crc16 = (old.def_crc & 0xFFFF) as u16;
        let def = MessageDefinition {
            id: 42,
            name: "BESTPOS".to_string(),
            format: HeaderFormat::All,
            source: None,
            layouts: vec![old.clone(), new.clone()],
        };
        assert_eq!(def.layout_for_crc16(old_crc16).def_crc, old.def_crc);
        // Unknown CRC falls back to the latest layout.
        let new_crc16 = (new.def_crc & 0xFFFF) as u16;
        let miss = (0..=u16::MAX)
            .find(|c| *c != old_crc16 && *c != new_crc16)
            .unwrap();
        assert_eq!(def.layout_for_crc16(miss).def_crc, new.def_crc);
        assert_eq!(def.latest().def_crc, new.def_crc);
    }

    #[test]
    fn test_enum_lookup() {
        let def = EnumDefinition {
            name: "SolStatus".to_string(),
            values: vec![
                EnumValue {
                    name: "SOL_COMPUTED".to_string(),
                    value: 0,
                },
                EnumValue {
                    name: "INSUFFICIENT_OBS".to_string(),
                    value: 1,
                },
            ],
        };
        assert_eq!(def.label_of(0), Some("SOL_COMPUTED"));
        assert_eq!(def.value_of("INSUFFICIENT_OBS"), Some(1));
        assert_eq!(def.label_of(99), None);
        assert_eq!(def.value_of("NOPE"), None);
    }

    #[test]
    fn test_matches_format_and_source() {
        let def = MessageDefinition {
            id: 0,
            name: "GPGGA".to_string(),
            format: HeaderFormat::Nmea,
            source: None,
            layouts: vec![FieldLayout::new(vec![], None)],
        };
        assert!(def.matches(HeaderFormat::Nmea, MeasurementSource::Primary));
        assert!(!def.matches(HeaderFormat::Binary, MeasurementSource::Primary));

        let any = MessageDefinition {
            id: 42,
            name: "BESTPOS".to_string(),
            format: HeaderFormat::All,
            source: None,
            layouts: vec![FieldLayout::new(vec![], None)],
        };
        assert!(any.matches(HeaderFormat::Binary, MeasurementSource::Secondary));
        assert!(any.matches(HeaderFormat::Ascii, MeasurementSource::Primary));
        // A wildcard definition never claims NMEA frames.
        assert!(!any.matches(HeaderFormat::Nmea, MeasurementSource::Primary));
    }
}
