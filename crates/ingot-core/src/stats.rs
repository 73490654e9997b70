//! Load statistics
//!
//! Thread-safe collection of per-file and per-table results during a run,
//! folded into a [`RunSummary`] at the end. Sizes are tracked two ways: the
//! compressed size is what the file occupies on disk, the decoded size is
//! `entry_count * record_len`, i.e. the raw volume that went through the
//! decoder.

use crate::error::{LoadError, Result};
use chrono::{DateTime, Utc};
use ingot_common::{format_bytes, format_rate};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Statistics for one fully loaded data file.
#[derive(Debug, Clone, Serialize)]
pub struct DataFileInfo {
    pub path: PathBuf,
    pub compressed_size_bytes: u64,
    pub decoded_size_bytes: u64,
    pub entry_count: u64,
}

impl DataFileInfo {
    pub fn new(path: impl Into<PathBuf>, compressed_size: u64, entry_count: u64, record_len: usize) -> Self {
        Self {
            path: path.into(),
            compressed_size_bytes: compressed_size,
            decoded_size_bytes: entry_count * record_len as u64,
            entry_count,
        }
    }
}

/// How a table's load job ended.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Loaded { files: usize, entries: u64 },
    SkippedNoData,
    SkippedAlreadyLoaded { existing_entries: u64 },
    Failed { reason: String },
}

impl TableOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableOutcome::Loaded { .. } => "loaded",
            TableOutcome::SkippedNoData => "skipped_no_data",
            TableOutcome::SkippedAlreadyLoaded { .. } => "skipped_already_loaded",
            TableOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub table: String,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Shared collector the orchestrator and jobs write into.
#[derive(Debug, Default)]
pub struct RunStats {
    files: Mutex<Vec<DataFileInfo>>,
    outcomes: Mutex<Vec<TableResult>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&self, info: DataFileInfo) {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(info);
    }

    pub fn record_outcome(&self, table: impl Into<String>, outcome: TableOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(TableResult {
                table: table.into(),
                outcome,
            });
    }

    pub fn files(&self) -> Vec<DataFileInfo> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Folds the collected data into a summary. Totals are computed over
    /// completed files only, matching what actually reached the sink.
    pub fn finish(&self, run_id: Uuid, started_at: DateTime<Utc>, elapsed: Duration) -> RunSummary {
        let files = self.files();
        let mut results = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        results.sort_by(|a, b| a.table.cmp(&b.table));

        let total_entries: u64 = files.iter().map(|f| f.entry_count).sum();
        let total_compressed_bytes: u64 = files.iter().map(|f| f.compressed_size_bytes).sum();
        let total_decoded_bytes: u64 = files.iter().map(|f| f.decoded_size_bytes).sum();

        let secs = elapsed.as_secs_f64();
        let rate = |total: u64| if secs > 0.0 { total as f64 / secs } else { 0.0 };

        RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            elapsed_seconds: secs,
            tables_total: results.len(),
            tables_loaded: count(&results, "loaded"),
            tables_skipped_no_data: count(&results, "skipped_no_data"),
            tables_skipped_already_loaded: count(&results, "skipped_already_loaded"),
            tables_failed: count(&results, "failed"),
            total_entries,
            total_compressed_bytes,
            total_decoded_bytes,
            entries_per_second: rate(total_entries),
            bytes_per_second_compressed: rate(total_compressed_bytes),
            bytes_per_second_decoded: rate(total_decoded_bytes),
            files,
            results,
        }
    }
}

fn count(results: &[TableResult], status: &str) -> usize {
    results.iter().filter(|r| r.outcome.as_str() == status).count()
}

/// Final report for one load run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub tables_total: usize,
    pub tables_loaded: usize,
    pub tables_skipped_no_data: usize,
    pub tables_skipped_already_loaded: usize,
    pub tables_failed: usize,
    pub total_entries: u64,
    pub total_compressed_bytes: u64,
    pub total_decoded_bytes: u64,
    pub entries_per_second: f64,
    pub bytes_per_second_compressed: f64,
    pub bytes_per_second_decoded: f64,
    pub files: Vec<DataFileInfo>,
    pub results: Vec<TableResult>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.tables_failed > 0
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoadError::Internal(e.to_string()))
    }

    /// Logs the summary the way operators expect to read it after a run.
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            tables = self.tables_total,
            loaded = self.tables_loaded,
            skipped_no_data = self.tables_skipped_no_data,
            skipped_already_loaded = self.tables_skipped_already_loaded,
            failed = self.tables_failed,
            "Load run complete"
        );
        info!(
            entries = self.total_entries,
            compressed = %format_bytes(self.total_compressed_bytes),
            decoded = %format_bytes(self.total_decoded_bytes),
            elapsed = %format!("{:.2}s", self.elapsed_seconds),
            "Totals"
        );
        info!(
            entries_per_sec = %format!("{:.0}", self.entries_per_second),
            compressed_per_sec = %format_rate(self.bytes_per_second_compressed),
            decoded_per_sec = %format_rate(self.bytes_per_second_decoded),
            "Throughput"
        );
        for file in &self.files {
            debug!(
                path = %file.path.display(),
                entries = file.entry_count,
                compressed = %format_bytes(file.compressed_size_bytes),
                decoded = %format_bytes(file.decoded_size_bytes),
                "Data file"
            );
        }
    }
}
