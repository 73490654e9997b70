//! Ingot CLI - Main entry point

use clap::Parser;
use ingot_cli::{Cli, Commands};
use ingot_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Verbose mode: debug to console. Normal mode: keep the console to
    // warnings, details go to the log file if one is configured.
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("ingot")
        .build();

    // Merge with environment variables (they take precedence over flags)
    let log_config = log_config.clone().apply_env().unwrap_or(log_config);

    // Initialize logging (ignore errors as the CLI should work without it)
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Load {
            source_dir,
            out,
            dry_run,
            purge,
            max_concurrent,
            big_endian,
            deadline_secs,
            json,
        } => {
            ingot_cli::commands::load::run(
                source_dir,
                out,
                dry_run,
                purge,
                max_concurrent,
                big_endian,
                deadline_secs,
                json,
            )
            .await
        }

        Commands::Inspect { source_dir } => ingot_cli::commands::inspect::run(source_dir).await,
    }
}
