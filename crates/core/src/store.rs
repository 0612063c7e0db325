// crates/core/src/store.rs
//! File-backed storage for the live-session record.
//!
//! The file is the only state shared between server workers, so every read
//! goes to disk and every write is a full atomic replace: the record is
//! written to a uniquely named temp file in the same directory, fsynced, and
//! renamed over `live_mode.json`. Readers see either the old record or the
//! new one, never a torn write.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::live_state::{LiveSessionState, LiveStateRecord};

/// Write `bytes` to `path` via temp file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Accessor for `live_mode.json`. Holds no cached copy of the record.
#[derive(Debug, Clone)]
pub struct LiveStateStore {
    path: PathBuf,
}

impl LiveStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw record. `Ok(None)` when the file does not exist yet.
    pub fn read_record(&self) -> Result<Option<LiveStateRecord>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Load the current state.
    ///
    /// - Missing file: the default (disabled) record is persisted and returned.
    /// - `enabled` with a missing or invalid start time: the start time is
    ///   reset to `now` and persisted before returning.
    /// - Unparseable file: [`StoreError::Corrupt`].
    pub fn load(&self, now: DateTime<Utc>) -> Result<LiveSessionState, StoreError> {
        let Some(record) = self.read_record()? else {
            tracing::info!(path = %self.path.display(), "Creating default live state record");
            let state = LiveSessionState::Disabled;
            self.save(&state)?;
            return Ok(state);
        };

        let (state, repaired) = LiveSessionState::from_record(&record, now);
        if repaired {
            tracing::warn!(
                path = %self.path.display(),
                start_time = ?record.start_time,
                "Live state enabled without a valid start time, resetting start to now"
            );
            self.save(&state)?;
        }
        Ok(state)
    }

    /// Atomically replace the record. Errors are always returned to the caller.
    pub fn save(&self, state: &LiveSessionState) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(&state.to_record())?;
        write_atomic(&self.path, &payload).map_err(|e| StoreError::io(&self.path, e))?;
        tracing::debug!(
            path = %self.path.display(),
            enabled = state.is_enabled(),
            owner = %state.owner(),
            "Saved live state"
        );
        Ok(())
    }
}
