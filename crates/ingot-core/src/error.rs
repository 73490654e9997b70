//! Error types for the loader core

use crate::sink::SinkError;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Main error type for the loader core.
///
/// Table-level errors are caught at the table-job boundary and folded into
/// the run summary; configuration-class errors ([`LoadError::is_fatal`])
/// abort the whole run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("schema inconsistency in table '{table}': {reason}")]
    SchemaInconsistency { table: String, reason: String },

    #[error("record length mismatch for table '{table}': schema expects {expected} bytes, buffer has {actual}")]
    RecordLengthMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("no decoder registered for table '{table}'")]
    UnresolvedTableMapping { table: String },

    #[error("invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("sink failure: {0}")]
    Sink(#[from] SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run deadline of {secs}s exceeded")]
    DeadlineExceeded { secs: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl LoadError {
    /// Whether this error must abort the whole run rather than a single
    /// table job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::UnresolvedTableMapping { .. }
                | LoadError::Config(_)
                | LoadError::DeadlineExceeded { .. }
        )
    }
}
