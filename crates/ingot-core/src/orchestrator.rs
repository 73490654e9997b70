//! Load orchestration
//!
//! Schedules one job per cataloged table, with a semaphore bounding how many
//! run at once. Per-table failures are contained inside the job and reported
//! in the summary; only run-level problems fail the run itself: an unreadable
//! source directory, a table with no registered decoder, or an exceeded run
//! deadline. Run-level failures cancel whatever is still in flight.

use crate::catalog::{scan_dir, CatalogScan};
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::job::TableJob;
use crate::registry::DecoderRegistry;
use crate::resolve::{DataFileResolver, FsDataFileResolver};
use crate::sink::BulkSink;
use crate::stats::{RunStats, RunSummary, TableOutcome};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct LoadOrchestrator {
    config: LoaderConfig,
    sink: Arc<dyn BulkSink>,
    resolver: Arc<dyn DataFileResolver>,
}

impl LoadOrchestrator {
    pub fn new(config: LoaderConfig, sink: Arc<dyn BulkSink>) -> Self {
        Self {
            config,
            sink,
            resolver: Arc::new(FsDataFileResolver::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DataFileResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads every table cataloged under `source_dir`, decoding with the
    /// configured byte order.
    pub async fn run(&self, source_dir: &Path) -> Result<RunSummary> {
        let scan = self.scan(source_dir)?;
        let registry =
            DecoderRegistry::from_schemas(scan.schemas.iter().cloned(), self.config.byte_order);
        self.execute(source_dir, scan, Arc::new(registry)).await
    }

    /// Like [`run`](Self::run), but with caller-supplied decoders. Every
    /// cataloged table must be present in the registry; a miss aborts the
    /// run.
    pub async fn run_with_registry(
        &self,
        source_dir: &Path,
        registry: DecoderRegistry,
    ) -> Result<RunSummary> {
        let scan = self.scan(source_dir)?;
        self.execute(source_dir, scan, Arc::new(registry)).await
    }

    fn scan(&self, source_dir: &Path) -> Result<CatalogScan> {
        scan_dir(source_dir).map_err(|e| match e {
            LoadError::Io(io) => LoadError::Config(format!(
                "cannot scan source directory {}: {io}",
                source_dir.display()
            )),
            other => other,
        })
    }

    async fn execute(
        &self,
        source_dir: &Path,
        scan: CatalogScan,
        registry: Arc<DecoderRegistry>,
    ) -> Result<RunSummary> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();
        let stats = Arc::new(RunStats::new());

        info!(
            run_id = %run_id,
            source = %source_dir.display(),
            tables = scan.schemas.len(),
            max_concurrent = self.config.max_concurrent_tables,
            byte_order = %self.config.byte_order,
            "Starting load run"
        );

        for (table, err) in &scan.failures {
            warn!(table = %table, error = %err, "Schema manifest rejected");
            stats.record_outcome(
                table.clone(),
                TableOutcome::Failed {
                    reason: err.to_string(),
                },
            );
        }

        // A table without a decoder is configuration drift; the run aborts
        // here, before any target is touched or any job spawned.
        for schema in &scan.schemas {
            if !registry.contains(schema.table_name()) {
                error!(
                    table = %schema.table_name(),
                    "No decoder registered for table, aborting run"
                );
                return Err(LoadError::UnresolvedTableMapping {
                    table: schema.table_name().to_string(),
                });
            }
        }

        if self.config.purge_before_load {
            for schema in &scan.schemas {
                self.sink.drop_target(schema.table_name()).await?;
                info!(table = %schema.table_name(), "Dropped target before load");
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tables));
        let cancel = CancellationToken::new();
        let fatal: Arc<Mutex<Option<LoadError>>> = Arc::new(Mutex::new(None));

        let deadline_hit = Arc::new(AtomicBool::new(false));
        let watchdog = self.config.run_deadline().map(|deadline| {
            let cancel = cancel.clone();
            let deadline_hit = Arc::clone(&deadline_hit);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => {
                        warn!(
                            deadline_secs = deadline.as_secs(),
                            "Run deadline exceeded, cancelling in-flight tables"
                        );
                        deadline_hit.store(true, Ordering::SeqCst);
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let mut jobs: JoinSet<(String, TableOutcome)> = JoinSet::new();
        for schema in scan.schemas {
            let table = schema.table_name().to_string();
            let registry = Arc::clone(&registry);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let fatal = Arc::clone(&fatal);
            let stats = Arc::clone(&stats);
            let sink = Arc::clone(&self.sink);
            let resolver = Arc::clone(&self.resolver);
            let source_dir = source_dir.to_path_buf();
            let write_queue_len = self.config.write_queue_len;

            jobs.spawn(async move {
                let cancelled_outcome = || TableOutcome::Failed {
                    reason: "run cancelled".to_string(),
                };

                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (table, cancelled_outcome()),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (table, cancelled_outcome()),
                    },
                };

                let decoder = match registry.get(&table) {
                    Ok(decoder) => decoder,
                    Err(e) => {
                        error!(table = %table, "No decoder registered for table, aborting run");
                        let reason = e.to_string();
                        fatal
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(e);
                        cancel.cancel();
                        return (table, TableOutcome::Failed { reason });
                    }
                };

                let job = TableJob::new(
                    decoder,
                    source_dir,
                    sink,
                    resolver,
                    write_queue_len,
                    stats,
                    cancel,
                );
                let outcome = job.run().await;
                (table, outcome)
            });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((table, outcome)) => stats.record_outcome(table, outcome),
                Err(e) => error!(error = %e, "Table job panicked"),
            }
        }

        if let Some(handle) = watchdog {
            handle.abort();
        }

        if deadline_hit.load(Ordering::SeqCst) {
            return Err(LoadError::DeadlineExceeded {
                secs: self.config.run_deadline_secs.unwrap_or_default(),
            });
        }

        if let Some(e) = fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(e);
        }

        let summary = stats.finish(run_id, started_at, timer.elapsed());
        summary.log();
        Ok(summary)
    }
}
