//! `ingot load` command implementation
//!
//! Runs a full load of a source directory into the selected sink and prints
//! the run summary.

use anyhow::Result;
use colored::Colorize;
use ingot_common::{format_bytes, format_rate};
use ingot_core::{
    BulkSink, Endianness, JsonlSink, LoadOrchestrator, LoaderConfig, MemorySink, RunSummary,
    TableOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Load every table found in `source_dir`.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    source_dir: PathBuf,
    out: Option<PathBuf>,
    dry_run: bool,
    purge: bool,
    max_concurrent: Option<usize>,
    big_endian: bool,
    deadline_secs: Option<u64>,
    json: bool,
) -> Result<()> {
    // Environment supplies the defaults, flags override.
    let mut config = LoaderConfig::from_env()?;
    if let Some(n) = max_concurrent {
        config.max_concurrent_tables = n;
    }
    if big_endian {
        config.byte_order = Endianness::Big;
    }
    if purge {
        config.purge_before_load = true;
    }
    if let Some(secs) = deadline_secs {
        config.run_deadline_secs = Some(secs);
    }
    config.validate()?;

    let sink: Arc<dyn BulkSink> = match (&out, dry_run) {
        (Some(dir), false) => Arc::new(JsonlSink::new(dir.clone())),
        _ => Arc::new(MemorySink::new()),
    };
    if dry_run || out.is_none() {
        println!("Dry run: entries are decoded and counted but not persisted.");
    }

    let orchestrator = LoadOrchestrator::new(config, sink);
    let summary = orchestrator.run(&source_dir).await?;

    print_summary(&summary, json)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("{}", "Tables:".cyan().bold());
    for result in &summary.results {
        match &result.outcome {
            TableOutcome::Loaded { files, entries } => {
                println!(
                    "  {}  {} entries from {} data file(s)",
                    result.table.green(),
                    entries,
                    files
                );
            }
            TableOutcome::SkippedNoData => {
                println!("  {}  skipped, no data files", result.table.yellow());
            }
            TableOutcome::SkippedAlreadyLoaded { existing_entries } => {
                println!(
                    "  {}  skipped, already holds {} entries",
                    result.table.yellow(),
                    existing_entries
                );
            }
            TableOutcome::Failed { reason } => {
                println!("  {}  failed: {}", result.table.red(), reason);
            }
        }
    }

    println!();
    println!("{}", "Summary:".cyan().bold());
    println!("  Run ID:      {}", summary.run_id);
    println!(
        "  Tables:      {} ({} loaded, {} skipped, {} failed)",
        summary.tables_total,
        summary.tables_loaded,
        summary.tables_skipped_no_data + summary.tables_skipped_already_loaded,
        summary.tables_failed
    );
    println!("  Entries:     {}", summary.total_entries);
    println!(
        "  Compressed:  {}",
        format_bytes(summary.total_compressed_bytes)
    );
    println!(
        "  Decoded:     {}",
        format_bytes(summary.total_decoded_bytes)
    );
    println!("  Elapsed:     {:.2}s", summary.elapsed_seconds);
    println!(
        "  Throughput:  {:.0} entries/s, {} compressed, {} decoded",
        summary.entries_per_second,
        format_rate(summary.bytes_per_second_compressed),
        format_rate(summary.bytes_per_second_decoded)
    );

    Ok(())
}
