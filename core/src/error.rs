//! Error types for the search core.
//!
//! Crawl-time problems are skips and never reach this type; what remains are
//! configuration mistakes and snapshot I/O.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The persisted snapshot is missing, truncated or fails its checksum.
    /// Callers are expected to rebuild rather than serve empty results.
    #[error("index unavailable at {}: {reason}", path.display())]
    IndexUnavailable { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::IndexUnavailable { path: path.into(), reason: reason.into() }
    }

    /// True when the caller should trigger a full rebuild.
    pub fn is_index_unavailable(&self) -> bool {
        matches!(self, Error::IndexUnavailable { .. })
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
