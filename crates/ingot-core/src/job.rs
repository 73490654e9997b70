//! Per-table load job
//!
//! Loads one table's data files into its sink target. Files are processed
//! sequentially; within a file a blocking task decodes records into a bounded
//! channel while the async side drains them into the sink writer, so decoding
//! never runs ahead of a slow sink by more than the queue length.
//!
//! Keys are assigned from a counter starting at 0 that runs across all of the
//! table's files, in file order.

use crate::codec::{RecordDecoder, RecordReader};
use crate::error::{LoadError, Result};
use crate::record::DecodedRecord;
use crate::resolve::{on_disk_size, open_data_reader, DataFileResolver};
use crate::schema::RecordDescriptor;
use crate::sink::{BulkSink, SinkTarget};
use crate::stats::{DataFileInfo, RunStats, TableOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct TableJob {
    decoder: Arc<dyn RecordDecoder>,
    source_dir: PathBuf,
    sink: Arc<dyn BulkSink>,
    resolver: Arc<dyn DataFileResolver>,
    write_queue_len: usize,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
}

impl TableJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decoder: Arc<dyn RecordDecoder>,
        source_dir: impl Into<PathBuf>,
        sink: Arc<dyn BulkSink>,
        resolver: Arc<dyn DataFileResolver>,
        write_queue_len: usize,
        stats: Arc<RunStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            decoder,
            source_dir: source_dir.into(),
            sink,
            resolver,
            write_queue_len,
            stats,
            cancel,
        }
    }

    pub fn table_name(&self) -> &str {
        self.decoder.schema().table_name()
    }

    /// Runs the job to completion. Failures never escape: anything that goes
    /// wrong inside this table becomes a [`TableOutcome::Failed`] so other
    /// tables keep loading.
    pub async fn run(self) -> TableOutcome {
        let table = self.table_name().to_string();
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(LoadError::Cancelled) => {
                debug!(table = %table, "Table load cancelled");
                TableOutcome::Failed {
                    reason: "run cancelled".to_string(),
                }
            }
            Err(e) => {
                error!(table = %table, error = %e, "Table load failed");
                TableOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn execute(&self) -> Result<TableOutcome> {
        let schema = Arc::clone(self.decoder.schema());
        let table = schema.table_name();

        let files = self.resolver.resolve(&schema, &self.source_dir)?;
        if files.is_empty() {
            warn!(
                table = %table,
                dir = %self.source_dir.display(),
                "No data files for table, nothing to load"
            );
            return Ok(TableOutcome::SkippedNoData);
        }

        let target = self.sink.create_target(table).await?;
        let existing = target.current_size().await?;
        if existing > 0 {
            warn!(
                table = %table,
                existing_entries = existing,
                "Target already holds data, skipping load"
            );
            return Ok(TableOutcome::SkippedAlreadyLoaded {
                existing_entries: existing,
            });
        }

        info!(table = %table, files = files.len(), "Loading table");

        let mut key: i64 = 0;
        let mut entries: u64 = 0;
        for path in &files {
            entries += self.load_file(&schema, target.as_ref(), path, &mut key).await?;
        }

        info!(table = %table, entries, files = files.len(), "Table loaded");
        Ok(TableOutcome::Loaded {
            files: files.len(),
            entries,
        })
    }

    /// Streams one data file into the target. Returns the number of entries
    /// written.
    async fn load_file(
        &self,
        schema: &Arc<RecordDescriptor>,
        target: &dyn SinkTarget,
        path: &Path,
        key: &mut i64,
    ) -> Result<u64> {
        let table = schema.table_name();
        let compressed_size = on_disk_size(path)?;
        debug!(table = %table, path = %path.display(), "Loading data file");

        let mut writer = target.open_writer().await?;
        let (tx, mut rx) = mpsc::channel::<DecodedRecord>(self.write_queue_len);

        let decoder = Arc::clone(&self.decoder);
        let read_path = path.to_path_buf();
        let producer = tokio::task::spawn_blocking(move || -> Result<()> {
            let reader = open_data_reader(&read_path)?;
            let mut records = RecordReader::new(reader, decoder);
            while let Some(record) = records.read_record()? {
                if tx.blocking_send(record).is_err() {
                    // Consumer hung up, stop decoding.
                    break;
                }
            }
            Ok(())
        });

        let mut written: u64 = 0;
        let drained: Result<()> = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Err(LoadError::Cancelled),
                maybe = rx.recv() => match maybe {
                    Some(record) => {
                        if let Err(e) = writer.add(*key, record).await {
                            break Err(e.into());
                        }
                        *key += 1;
                        written += 1;
                    }
                    None => break Ok(()),
                }
            }
        };

        // Unblock the producer before joining it, then surface errors in the
        // order they matter: consumer first, decode second.
        drop(rx);
        let produced = producer
            .await
            .map_err(|e| LoadError::Internal(format!("decode task failed: {e}")))?;
        drained?;
        produced?;
        writer.close().await?;

        self.stats.record_file(DataFileInfo::new(
            path,
            compressed_size,
            written,
            schema.record_len(),
        ));
        debug!(table = %table, path = %path.display(), entries = written, "Data file loaded");
        Ok(written)
    }
}
