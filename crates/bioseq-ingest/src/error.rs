//! Ingestion error types
//!
//! Two tiers:
//! - [`IngestError`] is file-level and aborts the whole `ingest` call.
//! - [`NormalizeError`] is row-level; the row is counted and the batch goes on
//!   unless [`MissingFieldPolicy::AbortFile`](crate::config::MissingFieldPolicy)
//!   escalates a missing field.

use std::path::PathBuf;
use thiserror::Error;

use crate::db::DbError;

/// A required field is absent from a row that carries a row index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing required field '{field}' (column '{column}')")]
pub struct MissingFieldError {
    /// Canonical field name
    pub field: &'static str,
    /// Source CSV column the field is read from
    pub column: &'static str,
}

/// Row-level normalization failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    /// Only raised when strict value parsing is enabled
    #[error("invalid value '{value}' for field '{field}' (column '{column}')")]
    InvalidValue {
        field: &'static str,
        column: &'static str,
        value: String,
    },
}

/// Fatal, file-level ingestion failure
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed CSV in {} at line {line}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("{} is missing required columns: {}", path.display(), columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("row at line {line} of {} rejected: {source}", path.display())]
    RowRejected {
        path: PathBuf,
        line: u64,
        #[source]
        source: MissingFieldError,
    },

    #[error("invalid ingestion settings: {0}")]
    Config(#[source] bioseq_common::BioseqError),

    #[error("failed to connect to the store: {0}")]
    Connect(#[source] DbError),

    #[error("failed to ensure target table: {0}")]
    Schema(#[source] DbError),
}

impl IngestError {
    /// Classify a csv error raised while reading `path`
    pub(crate) fn from_csv(path: impl Into<PathBuf>, err: csv::Error) -> Self {
        let path = path.into();
        match err.position().map(|p| p.line()) {
            Some(line) if !err.is_io_error() => IngestError::Malformed {
                path,
                line,
                source: err,
            },
            _ => IngestError::Unreadable { path, source: err },
        }
    }
}
