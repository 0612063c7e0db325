// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the live-session state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on live state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Live state file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to serialize live state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the record exists but cannot be parsed.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Errors raised by the server-side entry log.
#[derive(Debug, Error)]
pub enum EntryLogError {
    #[error("IO error on entry log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry log {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to serialize entry log: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No entries to undo")]
    Empty,
}

impl EntryLogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
