// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The message definition database.
//!
//! Parsed once from a JSON document, optionally patched with
//! [`MessageDatabase::append_messages`], then immutable for the lifetime of
//! every pipeline built over it. Lookups are by numeric ID or canonical
//! name, disambiguated by wire format and measurement source.

pub mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use schema::{
    definition_crc, ArrayKind, ArraySpec, DataType, DatabaseDocument, EnumDefinition,
    FieldDescriptor, FieldLayout, MessageDefinition, MessageEntry, StructDefinition,
};

use crate::core::{HeaderFormat, MeasurementSource, Result, TranscodeError};

/// Indexed message-definition database.
#[derive(Debug, Default)]
pub struct MessageDatabase {
    by_name: HashMap<String, Vec<Arc<MessageDefinition>>>,
    by_id: HashMap<u16, Vec<Arc<MessageDefinition>>>,
    enums: HashMap<String, Arc<EnumDefinition>>,
    structs: HashMap<String, Arc<StructDefinition>>,
}

impl MessageDatabase {
    /// Build a database from a JSON document.
    pub fn from_str(json: &str) -> Result<Self> {
        let mut db = Self::default();
        db.append_messages(json)?;
        Ok(db)
    }

    /// Build a database from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TranscodeError::invalid_database(path.as_ref().display().to_string(), e.to_string())
        })?;
        Self::from_str(&text)
    }

    /// Splice additional definitions into the database.
    ///
    /// The document has the same shape as the base database; entries with a
    /// name already present replace the existing definition. Must not be
    /// called once decoding has begun (the parser holds the database behind
    /// an `Arc`, which enforces this at the type level).
    pub fn append_messages(&mut self, json: &str) -> Result<()> {
        if json.trim().is_empty() {
            return Ok(());
        }
        let doc: DatabaseDocument = serde_json::from_str(json)
            .map_err(|e| TranscodeError::invalid_database("database document", e.to_string()))?;

        for enum_def in doc.enums {
            self.enums.insert(enum_def.name.clone(), Arc::new(enum_def));
        }
        for struct_def in doc.structs {
            self.structs
                .insert(struct_def.name.clone(), Arc::new(struct_def));
        }
        for entry in doc.messages {
            let definition = Arc::new(self.build_definition(entry)?);
            self.remove_entry(&definition.name);
            self.by_name
                .entry(definition.name.clone())
                .or_default()
                .push(Arc::clone(&definition));
            self.by_id
                .entry(definition.id)
                .or_default()
                .push(definition);
        }
        Ok(())
    }

    fn build_definition(&self, entry: MessageEntry) -> Result<MessageDefinition> {
        let mut layouts: Vec<FieldLayout> = entry
            .layouts
            .into_iter()
            .map(|layout| FieldLayout::new(layout.fields, layout.crc))
            .collect();
        // An explicit empty field list is a valid body-less layout (NMEA
        // markers); only an entry with neither key is rejected.
        if let Some(fields) = entry.fields {
            layouts.push(FieldLayout::new(fields, None));
        }
        if layouts.is_empty() {
            return Err(TranscodeError::invalid_database(
                "message entry",
                format!("message '{}' has no field layout", entry.name),
            ));
        }
        // Validate array keywords and struct references up front so decode
        // never trips over a bad document.
        for layout in &layouts {
            self.validate_fields(&layout.fields, &entry.name)?;
        }

        let format = match entry.format.as_deref() {
            None => HeaderFormat::All,
            Some(text) => parse_format(text).ok_or_else(|| {
                TranscodeError::invalid_database(
                    "message entry",
                    format!("unknown format '{text}' on message '{}'", entry.name),
                )
            })?,
        };
        let source = match entry.source.as_deref() {
            None => None,
            Some("PRIMARY") => Some(MeasurementSource::Primary),
            Some("SECONDARY") => Some(MeasurementSource::Secondary),
            Some(text) => {
                return Err(TranscodeError::invalid_database(
                    "message entry",
                    format!("unknown source '{text}' on message '{}'", entry.name),
                ))
            }
        };

        Ok(MessageDefinition {
            id: entry.id,
            name: entry.name,
            format,
            source,
            layouts,
        })
    }

    fn validate_fields(&self, fields: &[FieldDescriptor], message: &str) -> Result<()> {
        for field in fields {
            field.array_kind()?;
            match field.data_type {
                DataType::Enum => {
                    let enum_name = field.enum_name.as_deref().ok_or_else(|| {
                        TranscodeError::invalid_database(
                            "field",
                            format!("enum field '{}' in '{message}' names no enum", field.name),
                        )
                    })?;
                    if !self.enums.contains_key(enum_name) {
                        return Err(TranscodeError::invalid_database(
                            "field",
                            format!("enum '{enum_name}' referenced by '{message}' is not defined"),
                        ));
                    }
                }
                DataType::Struct => {
                    if let Some(struct_name) = field.struct_name.as_deref() {
                        let nested = self.structs.get(struct_name).ok_or_else(|| {
                            TranscodeError::invalid_database(
                                "field",
                                format!(
                                    "struct '{struct_name}' referenced by '{message}' is not defined"
                                ),
                            )
                        })?;
                        self.validate_fields(&nested.fields, message)?;
                    } else if field.fields.is_empty() {
                        return Err(TranscodeError::invalid_database(
                            "field",
                            format!(
                                "struct field '{}' in '{message}' has neither inline fields nor a reference",
                                field.name
                            ),
                        ));
                    } else {
                        self.validate_fields(&field.fields, message)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn remove_entry(&mut self, name: &str) {
        if let Some(existing) = self.by_name.remove(name) {
            for def in existing {
                if let Some(ids) = self.by_id.get_mut(&def.id) {
                    ids.retain(|d| d.name != def.name);
                }
            }
        }
    }

    /// Look up a definition by numeric ID.
    pub fn get_by_id(
        &self,
        id: u16,
        format: HeaderFormat,
        source: MeasurementSource,
    ) -> Option<Arc<MessageDefinition>> {
        self.by_id
            .get(&id)?
            .iter()
            .find(|d| d.matches(format, source))
            .cloned()
    }

    /// Look up a definition by canonical name.
    pub fn get_by_name(
        &self,
        name: &str,
        format: HeaderFormat,
        source: MeasurementSource,
    ) -> Option<Arc<MessageDefinition>> {
        self.by_name
            .get(name)?
            .iter()
            .find(|d| d.matches(format, source))
            .cloned()
    }

    /// Look up an enum definition.
    pub fn get_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name).map(Arc::as_ref)
    }

    /// Look up a shared struct definition.
    pub fn get_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.structs.get(name).map(Arc::as_ref)
    }

    /// Resolve the field list of a struct field (inline or referenced).
    pub fn struct_fields<'a>(&'a self, field: &'a FieldDescriptor) -> Result<&'a [FieldDescriptor]> {
        if let Some(struct_name) = field.struct_name.as_deref() {
            self.get_struct(struct_name)
                .map(|s| s.fields.as_slice())
                .ok_or_else(|| {
                    TranscodeError::invalid_database(
                        "field",
                        format!("struct '{struct_name}' is not defined"),
                    )
                })
        } else {
            Ok(&field.fields)
        }
    }

    /// Number of message definitions.
    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    /// Whether the database holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn parse_format(text: &str) -> Option<HeaderFormat> {
    match text.to_uppercase().as_str() {
        "ALL" => Some(HeaderFormat::All),
        "BINARY" => Some(HeaderFormat::Binary),
        "SHORT_BINARY" => Some(HeaderFormat::ShortBinary),
        "ASCII" => Some(HeaderFormat::Ascii),
        "SHORT_ASCII" => Some(HeaderFormat::ShortAscii),
        "ABB_ASCII" => Some(HeaderFormat::AbbAscii),
        "NMEA" => Some(HeaderFormat::Nmea),
        _ => None,
    }
}
