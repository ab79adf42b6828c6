//! Structured error types for cantrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::fmt;
use thiserror::Error;

/// Which fixed-width record layout a buffer was decoded as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Stage,
    Arrival,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Stage => f.write_str("stage"),
            RecordKind::Arrival => f.write_str("arrival"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record} record must be {expected} bytes, got {actual}")]
    SizeMismatch { record: RecordKind, expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    #[error("at least two timestamps required, got {len}")]
    InsufficientData { len: usize },

    #[error("timestamp {current} at index {index} precedes {previous}")]
    OutOfOrder { index: usize, previous: u64, current: u64 },
}

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("aggregation task has stopped")]
    Closed,

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report file {path}: {source}")]
    WriteFailed { path: String, source: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
