//! In-memory sink
//!
//! Keeps every loaded entry in a shared map. Used for dry runs and as the
//! reference sink in tests; the write and concurrency counters exist so tests
//! can assert on loader behavior (idempotent runs, writer bound) without
//! touching a real destination.

use super::{BulkSink, BulkWriter, SinkResult, SinkTarget};
use crate::record::DecodedRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type Store = Arc<Mutex<HashMap<String, Vec<(i64, DecodedRecord)>>>>;

#[derive(Default, Clone)]
pub struct MemorySink {
    store: Store,
    writes: Arc<AtomicU64>,
    active_writers: Arc<AtomicUsize>,
    max_active_writers: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries loaded into `table`, in insertion order. `None` if the target
    /// was never created.
    pub async fn entries(&self, table: &str) -> Option<Vec<(i64, DecodedRecord)>> {
        self.store.lock().await.get(table).cloned()
    }

    pub async fn entry_count(&self, table: &str) -> u64 {
        self.store
            .lock()
            .await
            .get(table)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0)
    }

    /// Total `add` calls across all writers since construction.
    pub fn total_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrently open writers.
    pub fn max_concurrent_writers(&self) -> usize {
        self.max_active_writers.load(Ordering::SeqCst)
    }

    /// Seeds a target with entries, as if a previous run had loaded them.
    pub async fn preload(&self, table: &str, entries: Vec<(i64, DecodedRecord)>) {
        self.store.lock().await.insert(table.to_string(), entries);
    }
}

#[async_trait]
impl BulkSink for MemorySink {
    async fn create_target(&self, name: &str) -> SinkResult<Box<dyn SinkTarget>> {
        self.store
            .lock()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(Box::new(MemoryTarget {
            name: name.to_string(),
            sink: self.clone(),
        }))
    }

    async fn drop_target(&self, name: &str) -> SinkResult<()> {
        self.store.lock().await.remove(name);
        Ok(())
    }
}

struct MemoryTarget {
    name: String,
    sink: MemorySink,
}

#[async_trait]
impl SinkTarget for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_size(&self) -> SinkResult<u64> {
        Ok(self.sink.entry_count(&self.name).await)
    }

    async fn open_writer(&self) -> SinkResult<Box<dyn BulkWriter>> {
        Ok(Box::new(MemoryWriter::new(
            self.name.clone(),
            self.sink.clone(),
        )))
    }
}

struct MemoryWriter {
    table: String,
    sink: MemorySink,
}

impl MemoryWriter {
    fn new(table: String, sink: MemorySink) -> Self {
        let active = sink.active_writers.fetch_add(1, Ordering::SeqCst) + 1;
        sink.max_active_writers.fetch_max(active, Ordering::SeqCst);
        Self { table, sink }
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.sink.active_writers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BulkWriter for MemoryWriter {
    async fn add(&mut self, key: i64, record: DecodedRecord) -> SinkResult<()> {
        self.sink
            .store
            .lock()
            .await
            .entry(self.table.clone())
            .or_default()
            .push((key, record));
        self.sink.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) -> SinkResult<()> {
        Ok(())
    }
}
