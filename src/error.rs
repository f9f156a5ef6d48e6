use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for join operations.
pub type JoinResult<T> = Result<T, JoinError>;

/// Error type returned by every stage of the partitioned join.
///
/// All variants are fatal for a run: the engine stops, removes its scratch files and never
/// publishes a partial output file.
#[derive(Debug, Error)]
pub enum JoinError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error for schema artifacts.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The task configuration is invalid (dataset count, output count, missing field, ...).
    #[error("config error: {message}")]
    Config { message: String },

    /// A referenced column is not declared, a declared column is missing, or two identically named
    /// columns disagree on their type.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Join-key lists differ in length across datasets.
    #[error("join arity mismatch: dataset {dataset} has {actual} key column(s), dataset 0 has {expected}")]
    JoinArity {
        dataset: usize,
        expected: usize,
        actual: usize,
    },

    /// A source file is empty or its size cannot be read.
    #[error("cannot compute shard count from '{}': {message}", path.display())]
    SizeComputation { path: PathBuf, message: String },

    /// A value could not be parsed into the column's declared type.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// The task stopped because another task of the same run failed first.
    #[error("cancelled after an earlier failure in the same run")]
    Cancelled,
}

impl JoinError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }
}
