//! Ingot Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the ingot workspace members.
//!
//! # Overview
//!
//! This crate provides functionality used by both the core loader and the CLI:
//!
//! - **Logging**: tracing subscriber setup (console/file, text/JSON)
//! - **Bytes**: human-readable byte and throughput formatting for summaries
//!
//! # Example
//!
//! ```no_run
//! use ingot_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("Loader starting");
//!     Ok(())
//! }
//! ```

pub mod bytes;
pub mod logging;

// Re-export commonly used helpers
pub use bytes::{format_bytes, format_rate};
