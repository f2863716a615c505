//! Crate-wide error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal reconciliation errors.
///
/// A subsystem value missing from a snapshot is not an error; it is recorded
/// as [`FieldValue::Missing`](crate::extract::FieldValue::Missing).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("missing directory: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("expected exactly one file matching \"{pattern}\" in {}, found {found}", .dir.display())]
    AmbiguousInput {
        dir: PathBuf,
        pattern: String,
        found: usize,
    },
    #[error("malformed CSV {}: {message}", .path.display())]
    MalformedCsv { path: PathBuf, message: String },
    #[error("malformed JSON {}: {message}", .path.display())]
    MalformedJson { path: PathBuf, message: String },
    #[error("invalid timestamp \"{value}\": {message}")]
    InvalidTimestamp { value: String, message: String },
    #[error("config error: {0}")]
    Config(String),
    #[error("plot error: {0}")]
    Plot(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReconcileError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
