// crates/bridge/src/error.rs
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of one outbound call to the dashboard.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rate limited by server")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    Decode(String),

    /// The session belongs to another bridge. Never retried.
    #[error("{message} (current owner: {})", .owner.as_deref().unwrap_or("unknown"))]
    OwnershipConflict {
        owner: Option<String>,
        message: String,
    },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// Timeouts, refused or reset connections, 5xx and 429 are worth another
    /// attempt. Everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } => true,
            Self::Status { status, .. } => (500..600).contains(status),
            Self::Decode(_) | Self::OwnershipConflict { .. } | Self::Exhausted { .. } => false,
        }
    }

    /// Server-supplied minimum wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// The underlying failure, looking through [`ClientError::Exhausted`].
    pub fn root(&self) -> &ClientError {
        match self {
            Self::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Errors raised by the bridge's local backup file.
#[derive(Debug, Error)]
pub enum PendingQueueError {
    #[error("IO error on backup file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to serialize backup file: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backup task failed: {0}")]
    Task(String),
}

impl PendingQueueError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
