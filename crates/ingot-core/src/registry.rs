//! Decoder registry
//!
//! Explicit table-name to decoder mapping. Every table a run touches must be
//! registered up front; a lookup miss is [`LoadError::UnresolvedTableMapping`]
//! and is treated as fatal configuration drift rather than a per-table
//! failure, since it means the catalog and the decoder set disagree.

use crate::codec::{Endianness, RecordDecoder, SchemaDecoder};
use crate::error::{LoadError, Result};
use crate::schema::RecordDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn RecordDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry with one [`SchemaDecoder`] per schema, all using the
    /// same byte order.
    pub fn from_schemas(
        schemas: impl IntoIterator<Item = Arc<RecordDescriptor>>,
        order: Endianness,
    ) -> Self {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(Arc::new(SchemaDecoder::new(schema, order)));
        }
        registry
    }

    /// Registers a decoder under its schema's table name, replacing any
    /// previous decoder for that table.
    pub fn register(&mut self, decoder: Arc<dyn RecordDecoder>) {
        let table = decoder.schema().table_name().to_string();
        self.decoders.insert(table, decoder);
    }

    pub fn get(&self, table: &str) -> Result<Arc<dyn RecordDecoder>> {
        self.decoders
            .get(table)
            .cloned()
            .ok_or_else(|| LoadError::UnresolvedTableMapping {
                table: table.to_string(),
            })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.decoders.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}
