//! Ingot CLI Library
//!
//! Command-line interface for the fixed-width bulk loader.
//!
//! # Overview
//!
//! - **Loading**: decode and load every table in a source directory (`ingot load`)
//! - **Inspection**: show cataloged schemas and their record layouts (`ingot inspect`)

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ingot - fixed-width binary table loader
#[derive(Parser, Debug)]
#[command(name = "ingot")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load every table found in a source directory
    Load {
        /// Source directory holding schema manifests and data files
        source_dir: PathBuf,

        /// Directory to write loaded tables into, one JSONL file per table
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Decode and count entries without persisting anything
        #[arg(long)]
        dry_run: bool,

        /// Drop targets before loading instead of skipping non-empty ones
        #[arg(long)]
        purge: bool,

        /// Bound on concurrently loading tables
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Decode numeric fields as big-endian
        #[arg(long)]
        big_endian: bool,

        /// Abort the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the schemas cataloged in a source directory
    Inspect {
        /// Source directory holding schema manifests
        source_dir: PathBuf,
    },
}
