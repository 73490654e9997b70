//! Loader configuration

use crate::codec::Endianness;
use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Loader Configuration Constants
// ============================================================================

/// Default bound on concurrently loading tables.
pub const DEFAULT_MAX_CONCURRENT_TABLES: usize = 20;

/// Default capacity of the per-file decode queue.
pub const DEFAULT_WRITE_QUEUE_LEN: usize = 1024;

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// How many table jobs may run at once.
    pub max_concurrent_tables: usize,
    /// Bounded queue length between the decoder and the sink writer.
    pub write_queue_len: usize,
    /// Byte order of the numeric fields in the data files.
    pub byte_order: Endianness,
    /// Drop every target before loading instead of skipping non-empty ones.
    pub purge_before_load: bool,
    /// Optional wall-clock budget for the whole run, in seconds.
    pub run_deadline_secs: Option<u64>,
}

impl LoaderConfig {
    /// Load configuration from environment and defaults
    pub fn from_env() -> Result<Self> {
        let byte_order = match std::env::var("INGOT_BYTE_ORDER") {
            Ok(raw) => raw.parse()?,
            Err(_) => Endianness::default(),
        };

        let config = LoaderConfig {
            max_concurrent_tables: std::env::var("INGOT_MAX_CONCURRENT_TABLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONCURRENT_TABLES),
            write_queue_len: std::env::var("INGOT_WRITE_QUEUE_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WRITE_QUEUE_LEN),
            byte_order,
            purge_before_load: std::env::var("INGOT_PURGE_BEFORE_LOAD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            run_deadline_secs: std::env::var("INGOT_RUN_DEADLINE_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tables == 0 {
            return Err(LoadError::Config(
                "max concurrent tables must be greater than 0".to_string(),
            ));
        }

        if self.write_queue_len == 0 {
            return Err(LoadError::Config(
                "write queue length must be greater than 0".to_string(),
            ));
        }

        if self.run_deadline_secs == Some(0) {
            return Err(LoadError::Config(
                "run deadline must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tables: DEFAULT_MAX_CONCURRENT_TABLES,
            write_queue_len: DEFAULT_WRITE_QUEUE_LEN,
            byte_order: Endianness::default(),
            purge_before_load: false,
            run_deadline_secs: None,
        }
    }
}
