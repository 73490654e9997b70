//! End-to-end loader tests
//!
//! These build real source directories (manifests plus binary data files)
//! in temp dirs and run the orchestrator against an in-memory sink, checking:
//! - decoded values, key assignment, and multi-file ordering
//! - skip behavior for empty and already-loaded tables
//! - containment of per-table failures
//! - run-level aborts: unresolved decoders and deadlines
//! - the concurrency bound

use async_trait::async_trait;
use ingot_core::{
    BulkSink, BulkWriter, DecodedRecord, DecoderRegistry, Endianness, FieldValue, LoadError,
    LoadOrchestrator, LoaderConfig, MemorySink, SinkError, SinkResult, SinkTarget, TableOutcome,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const RECORD_LEN: usize = 24;

/// Manifest for the standard three-field test schema.
fn write_manifest(dir: &Path, table: &str) {
    let manifest = serde_json::json!({
        "table": table,
        "source_file": format!("{table}.dat"),
        "record_length": RECORD_LEN,
        "fields": [
            {"name": "id", "kind": "integer64"},
            {"name": "name", "kind": "fixed_text", "width": 8},
            {"name": "score", "kind": "float64"},
        ]
    });
    std::fs::write(
        dir.join(format!("{table}.schema.json")),
        serde_json::to_vec_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

fn record_bytes(id: i64, name: &str, score: f64) -> Vec<u8> {
    let mut row = Vec::with_capacity(RECORD_LEN);
    row.extend_from_slice(&id.to_le_bytes());
    let mut text = [b' '; 8];
    text[..name.len()].copy_from_slice(name.as_bytes());
    row.extend_from_slice(&text);
    row.extend_from_slice(&score.to_le_bytes());
    row
}

/// Writes `count` records with ids starting at `first_id`.
fn write_data(path: &Path, first_id: i64, count: usize) {
    let mut data = Vec::with_capacity(count * RECORD_LEN);
    for i in 0..count {
        data.extend_from_slice(&record_bytes(first_id + i as i64, "ROW", 0.5));
    }
    std::fs::write(path, data).unwrap();
}

fn orchestrator(config: LoaderConfig, sink: &MemorySink) -> LoadOrchestrator {
    LoadOrchestrator::new(config, Arc::new(sink.clone()))
}

// ============================================================================
// Decoding and Key Assignment
// ============================================================================

#[tokio::test]
async fn test_load_decodes_values_and_assigns_keys_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    let mut data = record_bytes(42, "ABC", 3.5);
    data.extend_from_slice(&record_bytes(43, "DEF", -1.25));
    std::fs::write(dir.path().join("trades.dat"), data).unwrap();

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_loaded, 1);
    assert_eq!(summary.total_entries, 2);

    let entries = sink.entries("trades").await.unwrap();
    let keys: Vec<i64> = entries.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![0, 1]);

    let (_, first) = &entries[0];
    assert_eq!(first.get("id").and_then(FieldValue::as_i64), Some(42));
    assert_eq!(first.get("name").and_then(FieldValue::as_text), Some("ABC"));
    assert_eq!(first.get("score").and_then(FieldValue::as_f64), Some(3.5));
}

#[tokio::test]
async fn test_multipart_files_load_in_order_with_continuous_keys() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    // Parts written out of order on purpose; resolution sorts them.
    write_data(&dir.path().join("trades.dat.002"), 100, 50);
    write_data(&dir.path().join("trades.dat.001"), 0, 100);

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.total_entries, 150);
    assert_eq!(summary.files.len(), 2);
    // 150 entries at 24 bytes each.
    assert_eq!(summary.total_decoded_bytes, 3600);
    assert_eq!(summary.files[0].entry_count, 100);
    assert_eq!(summary.files[0].decoded_size_bytes, 2400);
    assert_eq!(summary.files[1].entry_count, 50);
    assert_eq!(summary.files[1].decoded_size_bytes, 1200);

    let entries = sink.entries("trades").await.unwrap();
    assert_eq!(entries.len(), 150);
    // Keys run across the file boundary without restarting.
    assert_eq!(entries[99].0, 99);
    assert_eq!(entries[100].0, 100);
    assert_eq!(
        entries[100].1.get("id").and_then(FieldValue::as_i64),
        Some(100)
    );
}

#[tokio::test]
async fn test_truncated_tail_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    let mut data = Vec::new();
    for id in 0..5 {
        data.extend_from_slice(&record_bytes(id, "ROW", 0.5));
    }
    data.extend_from_slice(&[0xAB; 10]);
    std::fs::write(dir.path().join("trades.dat"), data).unwrap();

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_loaded, 1);
    assert_eq!(summary.total_entries, 5);
    assert_eq!(sink.entry_count("trades").await, 5);
}

#[tokio::test]
async fn test_gzip_data_file_loads_like_plain() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");

    let mut raw = Vec::new();
    for id in 0..4 {
        raw.extend_from_slice(&record_bytes(id, "GZ", 1.0));
    }
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw).unwrap();
    let compressed = encoder.finish().unwrap();
    let compressed_len = compressed.len() as u64;
    std::fs::write(dir.path().join("trades.dat.gz"), compressed).unwrap();

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.total_entries, 4);
    // Compressed size is the on-disk size, decoded size the raw volume.
    assert_eq!(summary.files[0].compressed_size_bytes, compressed_len);
    assert_eq!(summary.files[0].decoded_size_bytes, 4 * RECORD_LEN as u64);
}

#[tokio::test]
async fn test_big_endian_configuration() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    let mut row = Vec::new();
    row.extend_from_slice(&42i64.to_be_bytes());
    row.extend_from_slice(b"ABC     ");
    row.extend_from_slice(&3.5f64.to_be_bytes());
    std::fs::write(dir.path().join("trades.dat"), row).unwrap();

    let config = LoaderConfig {
        byte_order: Endianness::Big,
        ..LoaderConfig::default()
    };
    let sink = MemorySink::new();
    orchestrator(config, &sink).run(dir.path()).await.unwrap();

    let entries = sink.entries("trades").await.unwrap();
    assert_eq!(entries[0].1.get("id").and_then(FieldValue::as_i64), Some(42));
    assert_eq!(
        entries[0].1.get("score").and_then(FieldValue::as_f64),
        Some(3.5)
    );
}

// ============================================================================
// Skip and Idempotency Behavior
// ============================================================================

#[tokio::test]
async fn test_table_without_data_files_is_skipped_successfully() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_total, 1);
    assert_eq!(summary.tables_skipped_no_data, 1);
    assert_eq!(summary.tables_failed, 0);
    assert_eq!(
        summary.results[0].outcome,
        TableOutcome::SkippedNoData
    );
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    write_data(&dir.path().join("trades.dat"), 0, 10);

    let sink = MemorySink::new();
    let loader = orchestrator(LoaderConfig::default(), &sink);

    let first = loader.run(dir.path()).await.unwrap();
    assert_eq!(first.tables_loaded, 1);
    assert_eq!(sink.total_writes(), 10);

    let second = loader.run(dir.path()).await.unwrap();
    assert_eq!(second.tables_loaded, 0);
    assert_eq!(second.tables_skipped_already_loaded, 1);
    assert_eq!(
        second.results[0].outcome,
        TableOutcome::SkippedAlreadyLoaded {
            existing_entries: 10
        }
    );
    // Nothing was written again.
    assert_eq!(sink.total_writes(), 10);
    assert_eq!(sink.entry_count("trades").await, 10);
}

#[tokio::test]
async fn test_purge_before_load_reloads_non_empty_target() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    write_data(&dir.path().join("trades.dat"), 0, 10);

    let sink = MemorySink::new();
    orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();
    assert_eq!(sink.total_writes(), 10);

    let config = LoaderConfig {
        purge_before_load: true,
        ..LoaderConfig::default()
    };
    let summary = orchestrator(config, &sink).run(dir.path()).await.unwrap();

    assert_eq!(summary.tables_loaded, 1);
    assert_eq!(sink.total_writes(), 20);
    assert_eq!(sink.entry_count("trades").await, 10);
}

// ============================================================================
// Failure Containment
// ============================================================================

/// Sink that refuses one named table but behaves normally for the rest.
struct FlakySink {
    inner: MemorySink,
    fail_table: String,
}

#[async_trait]
impl BulkSink for FlakySink {
    async fn create_target(&self, name: &str) -> SinkResult<Box<dyn SinkTarget>> {
        if name == self.fail_table {
            return Err(SinkError::Other("injected failure".to_string()));
        }
        self.inner.create_target(name).await
    }

    async fn drop_target(&self, name: &str) -> SinkResult<()> {
        self.inner.drop_target(name).await
    }
}

#[tokio::test]
async fn test_one_failing_table_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    for table in ["alpha", "beta"] {
        write_manifest(dir.path(), table);
        write_data(&dir.path().join(format!("{table}.dat")), 0, 3);
    }

    let inner = MemorySink::new();
    let sink = Arc::new(FlakySink {
        inner: inner.clone(),
        fail_table: "alpha".to_string(),
    });
    let summary = LoadOrchestrator::new(LoaderConfig::default(), sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_failed, 1);
    assert_eq!(summary.tables_loaded, 1);
    assert!(matches!(
        summary.results[0].outcome,
        TableOutcome::Failed { .. }
    ));
    assert_eq!(inner.entry_count("beta").await, 3);
}

#[tokio::test]
async fn test_broken_manifest_fails_that_table_only() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "good");
    write_data(&dir.path().join("good.dat"), 0, 2);
    std::fs::write(dir.path().join("broken.schema.json"), b"{ not json").unwrap();

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_total, 2);
    assert_eq!(summary.tables_loaded, 1);
    assert_eq!(summary.tables_failed, 1);
    assert_eq!(sink.entry_count("good").await, 2);
}

#[tokio::test]
async fn test_unloadable_table_is_not_scheduled() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    write_data(&dir.path().join("trades.dat"), 0, 2);
    let skipped = serde_json::json!({
        "table": "archive",
        "loadable": false,
        "fields": [{"name": "id", "kind": "integer64"}]
    });
    std::fs::write(
        dir.path().join("archive.schema.json"),
        serde_json::to_vec(&skipped).unwrap(),
    )
    .unwrap();

    let sink = MemorySink::new();
    let summary = orchestrator(LoaderConfig::default(), &sink)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.tables_total, 1);
    assert!(sink.entries("archive").await.is_none());
}

// ============================================================================
// Run-Level Aborts
// ============================================================================

#[tokio::test]
async fn test_missing_decoder_registration_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    for table in ["alpha", "beta"] {
        write_manifest(dir.path(), table);
        write_data(&dir.path().join(format!("{table}.dat")), 0, 3);
    }

    // Register a decoder for alpha only.
    let scan = ingot_core::scan_dir(dir.path()).unwrap();
    let alpha = scan
        .schemas
        .iter()
        .find(|s| s.table_name() == "alpha")
        .cloned()
        .unwrap();
    let registry = DecoderRegistry::from_schemas([alpha], Endianness::Little);

    let sink = MemorySink::new();
    let err = LoadOrchestrator::new(LoaderConfig::default(), Arc::new(sink.clone()))
        .run_with_registry(dir.path(), registry)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        LoadError::UnresolvedTableMapping { ref table } if table == "beta"
    ));
    // The abort happens before any table starts: no targets, no writes.
    assert_eq!(sink.total_writes(), 0);
    assert!(sink.entries("alpha").await.is_none());
    assert!(sink.entries("beta").await.is_none());
}

/// Sink whose writes never finish, to hold a run past its deadline.
struct StallSink;
struct StallTarget;
struct StallWriter;

#[async_trait]
impl BulkSink for StallSink {
    async fn create_target(&self, _name: &str) -> SinkResult<Box<dyn SinkTarget>> {
        Ok(Box::new(StallTarget))
    }

    async fn drop_target(&self, _name: &str) -> SinkResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SinkTarget for StallTarget {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn current_size(&self) -> SinkResult<u64> {
        Ok(0)
    }

    async fn open_writer(&self) -> SinkResult<Box<dyn BulkWriter>> {
        Ok(Box::new(StallWriter))
    }
}

#[async_trait]
impl BulkWriter for StallWriter {
    async fn add(&mut self, _key: i64, _record: DecodedRecord) -> SinkResult<()> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn close(self: Box<Self>) -> SinkResult<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_cancels_stalled_run() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "trades");
    write_data(&dir.path().join("trades.dat"), 0, 3);

    let config = LoaderConfig {
        run_deadline_secs: Some(1),
        ..LoaderConfig::default()
    };
    let err = LoadOrchestrator::new(config, Arc::new(StallSink))
        .run(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::DeadlineExceeded { secs: 1 }));
    assert!(err.is_fatal());
}

// ============================================================================
// Concurrency Bound
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tables_respect_the_bound() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        let table = format!("table{i}");
        write_manifest(dir.path(), &table);
        write_data(&dir.path().join(format!("{table}.dat")), 0, 25);
    }

    let config = LoaderConfig {
        max_concurrent_tables: 2,
        ..LoaderConfig::default()
    };
    let sink = MemorySink::new();
    let summary = orchestrator(config, &sink).run(dir.path()).await.unwrap();

    assert_eq!(summary.tables_loaded, 6);
    assert_eq!(summary.total_entries, 150);
    let peak = sink.max_concurrent_writers();
    assert!(peak >= 1, "at least one writer must have been open");
    assert!(peak <= 2, "writer peak {peak} exceeded the bound of 2");
}
