// crates/bridge/src/identity.rs
//! Per-process bridge identity, sent as `X-Client-Id` and used as the
//! live-session owner.

use std::fmt;

use chrono::Utc;

/// `host:pid:epoch_seconds`. A restarted bridge gets a new identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn generate() -> Self {
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        let host = if host.trim().is_empty() {
            "unknown-host".to_string()
        } else {
            host
        };
        Self(format!(
            "{}:{}:{}",
            host,
            std::process::id(),
            Utc::now().timestamp()
        ))
    }

    /// A fixed identity, for tests and for operators who pin one.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
