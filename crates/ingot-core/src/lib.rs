//! Ingot Core Library
//!
//! Bulk loader for fixed-width binary table exports. A source directory
//! holds one schema manifest per table plus the table's data files; the
//! loader decodes the fixed-layout records and streams them into a pluggable
//! bulk sink, one concurrent job per table.
//!
//! The usual entry point is [`LoadOrchestrator::run`]:
//!
//! ```no_run
//! use ingot_core::{LoadOrchestrator, LoaderConfig, MemorySink};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> ingot_core::Result<()> {
//! let orchestrator = LoadOrchestrator::new(LoaderConfig::default(), Arc::new(MemorySink::new()));
//! let summary = orchestrator.run(Path::new("/data/export")).await?;
//! println!("{} entries loaded", summary.total_entries);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod sink;
pub mod stats;

pub use catalog::{parse_schema, scan_dir, CatalogScan, SchemaManifest};
pub use codec::{decode_record, encode_record, Endianness, RecordDecoder, RecordReader, SchemaDecoder};
pub use config::LoaderConfig;
pub use error::{LoadError, Result};
pub use orchestrator::LoadOrchestrator;
pub use record::{DecodedRecord, FieldValue};
pub use registry::DecoderRegistry;
pub use resolve::{DataFileResolver, FsDataFileResolver};
pub use schema::{FieldDescriptor, FieldKind, RecordDescriptor};
pub use sink::{BulkSink, BulkWriter, JsonlSink, MemorySink, SinkError, SinkResult, SinkTarget};
pub use stats::{DataFileInfo, RunStats, RunSummary, TableOutcome, TableResult};
