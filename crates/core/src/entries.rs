// crates/core/src/entries.rs
//! Server-side log of counted arrivals (`trickortreat_data.json`).
//!
//! The file is a JSON array of `{timestamp, count, year}` objects. Writes go
//! through the same temp-file + rename path as the live-state record, and a
//! process-local mutex serialises read-modify-write cycles so two handlers in
//! the same worker cannot drop each other's append.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::error::EntryLogError;
use crate::store::write_atomic;
use crate::time::{parse_timestamp, serde_timestamp};

/// One counted arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(with = "serde_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub count: u32,
    pub year: i32,
}

impl Entry {
    pub fn single(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            count: 1,
            year: timestamp.year(),
        }
    }
}

/// An entry as received in an upload batch, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl RawEntry {
    /// Validate into an [`Entry`]. A missing count means 1; a missing year is
    /// derived from the timestamp.
    pub fn validate(&self) -> Result<Entry, String> {
        let raw_ts = self.timestamp.as_deref().unwrap_or_default();
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| format!("invalid timestamp {raw_ts:?}"))?;
        let count = match self.count {
            None => 1,
            Some(n) if n > 0 => u32::try_from(n).map_err(|_| format!("count {n} too large"))?,
            Some(n) => return Err(format!("count must be positive, got {n}")),
        };
        Ok(Entry {
            timestamp,
            count,
            year: self.year.unwrap_or_else(|| timestamp.year()),
        })
    }
}

/// Parse a stored JSON array one record at a time. Records that fail
/// [`RawEntry::validate`] are logged and skipped, so one bad line never
/// locks the file. Only a payload that is not an array is an error.
///
/// Each valid entry comes back with its raw object, for callers that keep
/// extra fields next to the entry.
pub fn parse_records(
    bytes: &[u8],
    source: &Path,
) -> Result<Vec<(Entry, Value)>, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_slice(bytes)?;
    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let checked = RawEntry::deserialize(&value)
            .map_err(|e| e.to_string())
            .and_then(|raw| raw.validate());
        match checked {
            Ok(entry) => records.push((entry, value)),
            Err(reason) => tracing::warn!(
                path = %source.display(),
                index,
                %reason,
                "Skipping invalid stored entry"
            ),
        }
    }
    Ok(records)
}

#[derive(Clone)]
pub struct EntryLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl EntryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// All valid entries, oldest first. A missing file is an empty log;
    /// invalid records are dropped on the next write.
    pub fn load(&self) -> Result<Vec<Entry>, EntryLogError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EntryLogError::io(&self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records = parse_records(&bytes, &self.path).map_err(|e| EntryLogError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(records.into_iter().map(|(entry, _)| entry).collect())
    }

    fn save(&self, entries: &[Entry]) -> Result<(), EntryLogError> {
        let payload = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &payload).map_err(|e| EntryLogError::io(&self.path, e))
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<Entry>) -> Result<T, EntryLogError>,
    ) -> Result<T, EntryLogError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        let out = f(&mut entries)?;
        self.save(&entries)?;
        Ok(out)
    }

    /// Append one arrival stamped now. Returns the entry and the new total.
    pub fn add_now(&self) -> Result<(Entry, usize), EntryLogError> {
        let entry = Entry::single(self.clock.now());
        let total = self.modify(|entries| {
            entries.push(entry.clone());
            Ok(entries.len())
        })?;
        tracing::info!(total, "Arrival added");
        Ok((entry, total))
    }

    /// Remove the most recent entry. Returns it and the new total.
    pub fn undo_last(&self) -> Result<(Entry, usize), EntryLogError> {
        let (removed, total) = self.modify(|entries| {
            let removed = entries.pop().ok_or(EntryLogError::Empty)?;
            Ok((removed, entries.len()))
        })?;
        tracing::info!(timestamp = %removed.timestamp, total, "Last entry removed");
        Ok((removed, total))
    }

    /// Append a batch. Returns the new total.
    pub fn extend(&self, batch: Vec<Entry>) -> Result<usize, EntryLogError> {
        let added = batch.len();
        let total = self.modify(move |entries| {
            entries.extend(batch);
            Ok(entries.len())
        })?;
        tracing::info!(added, total, "Batch appended");
        Ok(total)
    }

    /// Entries for `year`, ordered by timestamp.
    pub fn for_year(&self, year: i32) -> Result<Vec<Entry>, EntryLogError> {
        let mut entries: Vec<Entry> = self
            .load()?
            .into_iter()
            .filter(|e| e.year == year)
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn log_in(dir: &tempfile::TempDir) -> (EntryLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 10, 31, 22, 0, 0).unwrap(),
        ));
        let log = EntryLog::with_clock(dir.path().join("trickortreat_data.json"), clock.clone());
        (log, clock)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_add_and_undo() {
        let dir = tempfile::tempdir().unwrap();
        let (log, clock) = log_in(&dir);

        let (first, total) = log.add_now().unwrap();
        assert_eq!(total, 1);
        assert_eq!(first.year, 2025);
        clock.advance(Duration::seconds(20));
        let (second, total) = log.add_now().unwrap();
        assert_eq!(total, 2);

        let (removed, total) = log.undo_last().unwrap();
        assert_eq!(removed, second);
        assert_eq!(total, 1);
        assert_eq!(log.load().unwrap(), vec![first]);
    }

    #[test]
    fn test_undo_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        assert!(matches!(log.undo_last(), Err(EntryLogError::Empty)));
    }

    #[test]
    fn test_extend_and_filter_by_year() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        let old = Entry::single(Utc.with_ymd_and_hms(2024, 10, 31, 23, 0, 0).unwrap());
        let late = Entry::single(Utc.with_ymd_and_hms(2025, 10, 31, 23, 30, 0).unwrap());
        let early = Entry::single(Utc.with_ymd_and_hms(2025, 10, 31, 21, 0, 0).unwrap());

        let total = log.extend(vec![old, late.clone(), early.clone()]).unwrap();
        assert_eq!(total, 3);
        assert_eq!(log.for_year(2025).unwrap(), vec![early, late]);
    }

    #[test]
    fn test_reads_legacy_naive_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        std::fs::write(
            log.path(),
            r#"[{"timestamp": "2024-10-31T18:42:07.123456", "count": 1, "year": 2024}]"#,
        )
        .unwrap();
        let entries = log.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].year, 2024);
    }

    #[test]
    fn test_invalid_record_is_skipped_and_log_stays_writable() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        std::fs::write(
            log.path(),
            r#"[{"timestamp": "2024-10-31T24:05:00", "count": 1, "year": 2024},
                {"timestamp": "2024-10-31T19:00:00Z", "count": "two", "year": 2024},
                {"timestamp": "2024-10-31T19:01:00Z", "count": 1, "year": 2024}]"#,
        )
        .unwrap();

        assert_eq!(log.load().unwrap().len(), 1);
        let (_, total) = log.add_now().unwrap();
        assert_eq!(total, 2);
        let (_, total) = log.undo_last().unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_non_array_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = log_in(&dir);
        std::fs::write(log.path(), r#"{"entries": []}"#).unwrap();
        assert!(matches!(log.load(), Err(EntryLogError::Corrupt { .. })));
        assert!(matches!(log.add_now(), Err(EntryLogError::Corrupt { .. })));
    }

    #[test]
    fn test_raw_entry_validation() {
        let ok: RawEntry =
            serde_json::from_str(r#"{"timestamp":"2025-10-31T22:00:00Z","pending_upload":true}"#)
                .unwrap();
        let entry = ok.validate().unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.year, 2025);

        let bad_ts: RawEntry = serde_json::from_str(r#"{"timestamp":"soon","count":1}"#).unwrap();
        assert!(bad_ts.validate().is_err());

        let bad_count: RawEntry =
            serde_json::from_str(r#"{"timestamp":"2025-10-31T22:00:00Z","count":0}"#).unwrap();
        assert!(bad_count.validate().is_err());

        let missing: RawEntry = serde_json::from_str(r#"{"count":1}"#).unwrap();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let log = EntryLog::new(dir.path().join("trickortreat_data.json"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        log.add_now().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.load().unwrap().len(), 80);
    }
}
