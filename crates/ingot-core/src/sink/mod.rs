//! Bulk sink interface
//!
//! Provides traits for destination-specific sink implementations. The loader
//! pushes decoded records through these seams so the same orchestration works
//! against an in-memory store, a JSONL directory, or anything else that can
//! accept keyed records in bulk.
//!
//! Targets are keyed tables: `create_target` is get-or-create and never
//! discards existing data, which is what lets the loader use `current_size`
//! as an already-loaded guard. Destructive reloads go through `drop_target`
//! first.

use crate::record::DecodedRecord;
use async_trait::async_trait;

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlSink;
pub use memory::MemorySink;

/// Sink-side failure, wrapped into [`LoadError::Sink`](crate::error::LoadError)
/// at the loader boundary.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown sink target '{0}'")]
    UnknownTarget(String),

    #[error("sink error: {0}")]
    Other(String),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// A destination that can host named bulk-load targets.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Get or create the target for `name`. Existing data is kept.
    async fn create_target(&self, name: &str) -> SinkResult<Box<dyn SinkTarget>>;

    /// Drop the target and its data. Dropping a target that does not exist
    /// is not an error.
    async fn drop_target(&self, name: &str) -> SinkResult<()>;
}

/// A single named target within a sink.
#[async_trait]
pub trait SinkTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Number of entries already present. The loader skips targets that
    /// report a non-zero size.
    async fn current_size(&self) -> SinkResult<u64>;

    /// Open a streaming writer. Writers buffer internally; entries are only
    /// guaranteed visible after `close`.
    async fn open_writer(&self) -> SinkResult<Box<dyn BulkWriter>>;
}

/// Streaming writer for one target.
#[async_trait]
pub trait BulkWriter: Send {
    async fn add(&mut self, key: i64, record: DecodedRecord) -> SinkResult<()>;

    /// Flush and finalize. Consumes the writer so nothing can be added after.
    async fn close(self: Box<Self>) -> SinkResult<()>;
}
