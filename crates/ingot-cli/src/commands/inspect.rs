//! `ingot inspect` command implementation
//!
//! Catalogs a source directory and prints each schema's record layout and
//! the data files that would be loaded, without loading anything.

use anyhow::Result;
use colored::Colorize;
use ingot_common::format_bytes;
use ingot_core::{scan_dir, DataFileResolver, FsDataFileResolver};
use std::path::PathBuf;

/// Show the schemas cataloged in `source_dir`.
pub async fn run(source_dir: PathBuf) -> Result<()> {
    let scan = scan_dir(&source_dir)?;

    if scan.schemas.is_empty() && scan.failures.is_empty() {
        println!("No schema manifests found in {}.", source_dir.display());
        return Ok(());
    }

    let resolver = FsDataFileResolver::new();
    for schema in &scan.schemas {
        println!("{}", schema.table_name().green().bold());
        println!("  Source file:   {}", schema.source_file());
        println!("  Record length: {} bytes", schema.record_len());

        let files = resolver.resolve(schema, &source_dir)?;
        if files.is_empty() {
            println!("  Data files:    none");
        } else {
            let total: u64 = files
                .iter()
                .filter_map(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .sum();
            println!("  Data files:    {} ({})", files.len(), format_bytes(total));
        }

        println!("  Layout:");
        for window in schema.windows() {
            println!(
                "    {:>5}..{:<5} {:<12} {}",
                window.offset,
                window.offset + window.field.width(),
                window.field.kind().as_str(),
                window.field.name()
            );
        }
        println!();
    }

    for (table, err) in &scan.failures {
        println!("{}  {}", table.red().bold(), err);
    }
    if !scan.failures.is_empty() {
        println!();
    }

    println!("{}", "Summary:".cyan().bold());
    println!("  Tables:   {}", scan.schemas.len());
    println!("  Rejected: {}", scan.failures.len());

    Ok(())
}
