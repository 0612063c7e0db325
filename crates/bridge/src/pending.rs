// crates/bridge/src/pending.rs
//! The bridge's local backup file: an audit trail of confirmed presses plus
//! the queue of presses the server has not acknowledged yet.
//!
//! Stored as a JSON array in `trickortreat_data_backup.json`. Entries with
//! `pending_upload: true` are waiting for a batch upload; the flag never
//! leaves this machine. All read-modify-write cycles hold one mutex, and the
//! file is replaced atomically.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Utc};
use porchlight_core::entries::{parse_records, Entry};
use porchlight_core::store::write_atomic;
use porchlight_core::time::serde_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PendingQueueError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    #[serde(with = "serde_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub count: u32,
    pub year: i32,
    #[serde(default)]
    pub pending_upload: bool,
}

impl PendingEntry {
    /// One press at `timestamp`.
    pub fn press(timestamp: DateTime<Utc>, pending_upload: bool) -> Self {
        Self {
            timestamp,
            count: 1,
            year: timestamp.year(),
            pending_upload,
        }
    }

    /// The server-facing shape, without the local flag.
    pub fn to_upload(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": porchlight_core::time::format_timestamp(self.timestamp),
            "count": self.count,
            "year": self.year,
        })
    }

    fn from_record(entry: Entry, raw: &Value) -> Self {
        Self {
            timestamp: entry.timestamp,
            count: entry.count,
            year: entry.year,
            pending_upload: raw
                .get("pending_upload")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn same_press(&self, other: &PendingEntry) -> bool {
        self.timestamp == other.timestamp && self.count == other.count && self.year == other.year
    }
}

#[derive(Debug, Clone)]
pub struct PendingQueue {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PendingQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every valid record, oldest first. A missing or blank file is empty.
    /// Records that fail validation are skipped and vanish on the next write.
    pub fn load(&self) -> Result<Vec<PendingEntry>, PendingQueueError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PendingQueueError::io(&self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records =
            parse_records(&bytes, &self.path).map_err(|e| PendingQueueError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        Ok(records
            .into_iter()
            .map(|(entry, raw)| PendingEntry::from_record(entry, &raw))
            .collect())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<PendingEntry>) -> T,
    ) -> Result<T, PendingQueueError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        let out = f(&mut entries);
        let payload = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.path, &payload).map_err(|e| PendingQueueError::io(&self.path, e))?;
        Ok(out)
    }

    pub fn append(&self, entry: PendingEntry) -> Result<(), PendingQueueError> {
        self.modify(|entries| entries.push(entry))
    }

    /// Records still waiting for upload.
    pub fn pending(&self) -> Result<Vec<PendingEntry>, PendingQueueError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| e.pending_upload)
            .collect())
    }

    /// Clear the flag on exactly the records in `uploaded`. Records queued
    /// after the snapshot was taken keep theirs. Returns how many changed.
    pub fn mark_uploaded(&self, uploaded: &[PendingEntry]) -> Result<usize, PendingQueueError> {
        let mut remaining: Vec<&PendingEntry> = uploaded.iter().collect();
        self.modify(|entries| {
            let mut cleared = 0;
            for entry in entries.iter_mut().filter(|e| e.pending_upload) {
                if let Some(pos) = remaining.iter().position(|u| u.same_press(entry)) {
                    remaining.swap_remove(pos);
                    entry.pending_upload = false;
                    cleared += 1;
                }
            }
            cleared
        })
    }

    /// Drop the newest pending record, if any.
    pub fn cancel_latest_pending(&self) -> Result<Option<PendingEntry>, PendingQueueError> {
        self.modify(|entries| {
            let pos = entries.iter().rposition(|e| e.pending_upload)?;
            Some(entries.remove(pos))
        })
    }

    /// Drop the newest confirmed record, mirroring a server-side undo.
    pub fn remove_latest_confirmed(&self) -> Result<Option<PendingEntry>, PendingQueueError> {
        self.modify(|entries| {
            let pos = entries.iter().rposition(|e| !e.pending_upload)?;
            Some(entries.remove(pos))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 31, 22, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn queue_in(dir: &tempfile::TempDir) -> PendingQueue {
        PendingQueue::new(dir.path().join("trickortreat_data_backup.json"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(queue_in(&dir).load().unwrap().is_empty());
        assert!(queue_in(&dir).pending().unwrap().is_empty());
    }

    #[test]
    fn test_pending_filters_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        queue.append(PendingEntry::press(at(0), false)).unwrap();
        queue.append(PendingEntry::press(at(1), true)).unwrap();
        queue.append(PendingEntry::press(at(2), true)).unwrap();

        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].timestamp, at(1));
    }

    #[test]
    fn test_mark_uploaded_clears_only_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        queue.append(PendingEntry::press(at(1), true)).unwrap();
        queue.append(PendingEntry::press(at(2), true)).unwrap();
        let snapshot = queue.pending().unwrap();

        // Queued while the upload was in flight.
        queue.append(PendingEntry::press(at(3), true)).unwrap();

        assert_eq!(queue.mark_uploaded(&snapshot).unwrap(), 2);
        let left = queue.pending().unwrap();
        assert_eq!(left, vec![PendingEntry::press(at(3), true)]);
        assert_eq!(queue.load().unwrap().len(), 3);
    }

    #[test]
    fn test_mark_uploaded_handles_duplicate_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        queue.append(PendingEntry::press(at(1), true)).unwrap();
        queue.append(PendingEntry::press(at(1), true)).unwrap();

        let one = vec![PendingEntry::press(at(1), true)];
        assert_eq!(queue.mark_uploaded(&one).unwrap(), 1);
        assert_eq!(queue.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_latest_pending() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        queue.append(PendingEntry::press(at(1), true)).unwrap();
        queue.append(PendingEntry::press(at(2), false)).unwrap();

        let cancelled = queue.cancel_latest_pending().unwrap().unwrap();
        assert_eq!(cancelled.timestamp, at(1));
        assert!(queue.cancel_latest_pending().unwrap().is_none());
        assert_eq!(queue.load().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_latest_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        queue.append(PendingEntry::press(at(1), false)).unwrap();
        queue.append(PendingEntry::press(at(2), true)).unwrap();

        let removed = queue.remove_latest_confirmed().unwrap().unwrap();
        assert_eq!(removed.timestamp, at(1));
        assert_eq!(queue.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_upload_shape_omits_flag() {
        let value = PendingEntry::press(at(0), true).to_upload();
        assert!(value.get("pending_upload").is_none());
        assert_eq!(value["count"], 1);
        assert_eq!(value["year"], 2025);
    }

    #[test]
    fn test_reads_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        std::fs::write(
            queue.path(),
            r#"[{"timestamp": "2024-10-31T19:00:00.5", "count": 1, "year": 2024, "pending_upload": true},
                {"timestamp": "2024-10-31T19:01:00", "count": 1, "year": 2024}]"#,
        )
        .unwrap();
        let entries = queue.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].pending_upload);
        assert!(!entries[1].pending_upload);
    }

    #[test]
    fn test_invalid_record_does_not_block_appends() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        std::fs::write(
            queue.path(),
            r#"[{"timestamp": "2024-10-31T24:05:00", "count": 1, "year": 2024, "pending_upload": true},
                {"timestamp": "2024-10-31T19:01:00Z", "count": 1, "year": 2024, "pending_upload": true}]"#,
        )
        .unwrap();

        assert_eq!(queue.pending().unwrap().len(), 1);
        queue.append(PendingEntry::press(at(0), true)).unwrap();
        assert_eq!(queue.pending().unwrap().len(), 2);
        assert_eq!(queue.load().unwrap().len(), 2);
    }

    #[test]
    fn test_non_array_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir);
        std::fs::write(queue.path(), "not json").unwrap();
        assert!(matches!(
            queue.append(PendingEntry::press(at(0), true)),
            Err(PendingQueueError::Corrupt { .. })
        ));
    }
}
