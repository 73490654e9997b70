//! Decoded record values
//!
//! A [`DecodedRecord`] is the typed result of decoding one fixed-width
//! record. It is ephemeral: created per raw record, handed to the sink
//! write, never retained by the loader. Values are stored positionally and
//! share the table's [`RecordDescriptor`] through an `Arc`, so a record is
//! one small allocation plus its text values.

use crate::schema::{FieldKind, RecordDescriptor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// One decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer64(i64),
    Float64(f64),
    Text(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer64(_) => FieldKind::Integer64,
            FieldValue::Float64(_) => FieldKind::Float64,
            FieldValue::Text(_) => FieldKind::FixedText,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer64(v) => serializer.serialize_i64(*v),
            FieldValue::Float64(v) => serializer.serialize_f64(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer64(v) => write!(f, "{}", v),
            FieldValue::Float64(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

/// Typed field set decoded from one raw record.
///
/// Values appear in schema declaration order; name lookup goes through the
/// shared descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    schema: Arc<RecordDescriptor>,
    values: Vec<FieldValue>,
}

impl DecodedRecord {
    /// Values must already match the schema's field order; the decoder is
    /// the usual constructor.
    pub(crate) fn new(schema: Arc<RecordDescriptor>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(schema.fields().len(), values.len());
        Self { schema, values }
    }

    /// Builds a record from caller-supplied values, checking that count and
    /// kinds line up with the schema. This is the constructor for records
    /// that did not come off the wire, e.g. fixtures for
    /// [`encode_record`](crate::codec::encode_record).
    pub fn from_values(
        schema: Arc<RecordDescriptor>,
        values: Vec<FieldValue>,
    ) -> crate::error::Result<Self> {
        if values.len() != schema.fields().len() {
            return Err(crate::error::LoadError::InvalidFieldValue {
                field: schema.table_name().to_string(),
                reason: format!(
                    "expected {} values, got {}",
                    schema.fields().len(),
                    values.len()
                ),
            });
        }
        for (field, value) in schema.fields().iter().zip(&values) {
            if field.kind() != value.kind() {
                return Err(crate::error::LoadError::InvalidFieldValue {
                    field: field.name().to_string(),
                    reason: format!("expected {}, got {}", field.kind(), value.kind()),
                });
            }
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<RecordDescriptor> {
        &self.schema
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value by field name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let idx = self.schema.field_index(name)?;
        self.values.get(idx)
    }

    /// Iterate `(field name, value)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name())
            .zip(self.values.iter())
    }
}

impl Serialize for DecodedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
