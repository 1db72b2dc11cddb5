//! Error handling for ingestion and generation operations.
//!
//! Provides error types with context for chunk processing, window
//! generation, schema validation and sink failures.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by caller-supplied transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error in {context}: {reason}")]
    Schema { context: String, reason: String },

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Transform `{transform}` failed on chunk {chunk}: {source}")]
    Transform {
        transform: String,
        chunk: u64,
        #[source]
        source: BoxError,
    },

    #[error("Failed writing to {sink}: {reason}")]
    SinkWrite { sink: String, reason: String },

    #[error("Division by zero deriving `{column}` for row id {row_id}")]
    DivisionByZero { column: String, row_id: i64 },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Checkpoint store unavailable: {reason}")]
    CheckpointUnavailable { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SimError {
    /// Create a schema error for a file, table or frame
    pub fn schema(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(sink: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SinkWrite {
            sink: sink.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
