//! Record schema model
//!
//! Immutable value types describing a table's on-disk record layout. Fields
//! are laid out contiguously in declaration order with no padding and no
//! alignment, so every field's offset is the sum of the widths declared
//! before it and the record length is the sum of all widths.
//!
//! A [`RecordDescriptor`] is built once per run from the schema source,
//! validated on construction, and shared read-only (`Arc`) across all
//! concurrent decode and load operations for its table.

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Width in bytes of the two fixed-size numeric kinds.
pub const NUMERIC_WIDTH: usize = 8;

/// Semantic type of one record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// 64-bit signed integer, always 8 bytes
    Integer64,
    /// IEEE-754 double, always 8 bytes
    Float64,
    /// Single-byte (ASCII/Latin-1) text padded to its declared width
    FixedText,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Integer64 => "integer64",
            FieldKind::Float64 => "float64",
            FieldKind::FixedText => "fixed_text",
        }
    }

    /// The mandatory width for this kind, or `None` when the schema source
    /// declares it (text).
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldKind::Integer64 | FieldKind::Float64 => Some(NUMERIC_WIDTH),
            FieldKind::FixedText => None,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a fixed-width record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    width: usize,
}

impl FieldDescriptor {
    /// Build a descriptor, checking the width against the kind.
    pub fn new(name: impl Into<String>, kind: FieldKind, width: usize) -> Result<Self> {
        let name = name.into();
        if width == 0 {
            return Err(LoadError::SchemaInconsistency {
                table: String::new(),
                reason: format!("field '{}' has zero width", name),
            });
        }
        if let Some(expected) = kind.fixed_width() {
            if width != expected {
                return Err(LoadError::SchemaInconsistency {
                    table: String::new(),
                    reason: format!(
                        "field '{}' of kind {} must be {} bytes wide, got {}",
                        name, kind, expected, width
                    ),
                });
            }
        }
        Ok(Self { name, kind, width })
    }

    /// 8-byte signed integer field.
    pub fn integer64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Integer64,
            width: NUMERIC_WIDTH,
        }
    }

    /// 8-byte IEEE-754 double field.
    pub fn float64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Float64,
            width: NUMERIC_WIDTH,
        }
    }

    /// Fixed-width text field of `width` bytes.
    ///
    /// A zero width is rejected later, when the field set is assembled into
    /// a [`RecordDescriptor`].
    pub fn fixed_text(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::FixedText,
            width,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// A field plus its resolved byte window within the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWindow<'a> {
    pub field: &'a FieldDescriptor,
    pub offset: usize,
}

impl<'a> FieldWindow<'a> {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.field.width()
    }
}

/// Ordered field layout describing one table's fixed-width record.
///
/// Construction validates every field width, field-name uniqueness, and
/// (optionally) a declared total length from the schema source. The layout
/// invariant holds for every constructed value: the offset of field `i`
/// equals the summed widths of fields `0..i`, and [`record_len`] equals the
/// sum over all fields.
///
/// [`record_len`]: RecordDescriptor::record_len
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDescriptor {
    table_name: String,
    source_file: String,
    fields: Vec<FieldDescriptor>,
    record_len: usize,
}

impl RecordDescriptor {
    pub fn new(
        table_name: impl Into<String>,
        source_file: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self> {
        let table_name = table_name.into();
        let source_file = source_file.into();

        if table_name.is_empty() {
            return Err(LoadError::SchemaInconsistency {
                table: table_name,
                reason: "empty table name".to_string(),
            });
        }
        if fields.is_empty() {
            return Err(LoadError::SchemaInconsistency {
                table: table_name,
                reason: "record has no fields".to_string(),
            });
        }

        let mut record_len = 0usize;
        for (idx, field) in fields.iter().enumerate() {
            if field.width() == 0 {
                return Err(LoadError::SchemaInconsistency {
                    table: table_name,
                    reason: format!("field '{}' has zero width", field.name()),
                });
            }
            if let Some(expected) = field.kind().fixed_width() {
                if field.width() != expected {
                    return Err(LoadError::SchemaInconsistency {
                        table: table_name,
                        reason: format!(
                            "field '{}' of kind {} must be {} bytes wide, got {}",
                            field.name(),
                            field.kind(),
                            expected,
                            field.width()
                        ),
                    });
                }
            }
            if fields[..idx].iter().any(|f| f.name() == field.name()) {
                return Err(LoadError::SchemaInconsistency {
                    table: table_name,
                    reason: format!("duplicate field name '{}'", field.name()),
                });
            }
            record_len = record_len.checked_add(field.width()).ok_or_else(|| {
                LoadError::SchemaInconsistency {
                    table: table_name.clone(),
                    reason: format!(
                        "summed field widths overflow at field '{}'",
                        field.name()
                    ),
                }
            })?;
        }

        Ok(Self {
            table_name,
            source_file,
            fields,
            record_len,
        })
    }

    /// Cross-check a total record length declared by the schema source.
    ///
    /// Any drift between the declared length and the summed field widths is
    /// schema corruption, not a recoverable condition.
    pub fn verify_declared_length(&self, declared: usize) -> Result<()> {
        if declared != self.record_len {
            return Err(LoadError::SchemaInconsistency {
                table: self.table_name.clone(),
                reason: format!(
                    "declared record length {} does not match summed field widths {}",
                    declared, self.record_len
                ),
            });
        }
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Logical data file name before directory/extension resolution.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Total byte width of one record.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Derived offset of the field at `index`.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        if index >= self.fields.len() {
            return None;
        }
        Some(self.fields[..index].iter().map(|f| f.width()).sum())
    }

    /// Iterate fields together with their resolved byte windows, in
    /// declaration order.
    pub fn windows(&self) -> impl Iterator<Item = FieldWindow<'_>> {
        self.fields.iter().scan(0usize, |offset, field| {
            let window = FieldWindow {
                field,
                offset: *offset,
            };
            *offset += field.width();
            Some(window)
        })
    }

    /// Position of a field by name, if present.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }
}
