// crates/core/src/time.rs
//! Timestamp parsing shared by the live-state record and the entry log.
//!
//! New records are always written as RFC 3339 UTC. Older files written by
//! the first generation of the porch box contain naive local timestamps
//! (`2024-10-31T18:42:07.123456`); those are read with one fixed offset,
//! [`LEGACY_NAIVE_UTC_OFFSET_SECS`]. This is a known approximation for a
//! single evening of data, not a timezone database.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Offset applied to timestamps that carry no zone: UTC-4 (US Eastern
/// daylight time, which is in effect on October 31).
pub const LEGACY_NAIVE_UTC_OFFSET_SECS: i32 = -4 * 3600;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp. Returns `None` for anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let offset = FixedOffset::east_opt(LEGACY_NAIVE_UTC_OFFSET_SECS)?;
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical on-disk representation.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Serde adapter: writes RFC 3339, reads anything [`parse_timestamp`] accepts.
pub mod serde_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
