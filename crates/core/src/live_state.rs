// crates/core/src/live_state.rs
//! The single live-session record and its on-disk shape.
//!
//! In memory the record is a two-state enum so that "enabled without a start
//! time" cannot be represented. On disk it is the flat JSON object the
//! dashboard has always used:
//!
//! ```json
//! { "enabled": true, "start_time": "2025-10-31T22:00:00+00:00", "owner": "porch:4242:1761948000" }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{format_timestamp, parse_timestamp};

/// Who holds the live session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Owner {
    #[default]
    Unclaimed,
    ClaimedBy(String),
}

impl Owner {
    /// Empty or whitespace-only identifiers count as unclaimed.
    pub fn from_optional(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(id) if !id.is_empty() => Self::ClaimedBy(id.to_string()),
            _ => Self::Unclaimed,
        }
    }

    pub fn claimed_by(id: impl Into<String>) -> Self {
        Self::from_optional(Some(&id.into()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Unclaimed => None,
            Self::ClaimedBy(id) => Some(id),
        }
    }

    /// A disable request from `requester` is blocked only when both sides
    /// name an owner and the names differ.
    pub fn conflicts_with(&self, requester: &Owner) -> bool {
        match (self, requester) {
            (Self::ClaimedBy(current), Self::ClaimedBy(other)) => current != other,
            _ => false,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclaimed => f.write_str("<unclaimed>"),
            Self::ClaimedBy(id) => f.write_str(id),
        }
    }
}

/// The live-session toggle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LiveSessionState {
    #[default]
    Disabled,
    Enabled {
        started_at: DateTime<Utc>,
        owner: Owner,
    },
}

impl LiveSessionState {
    pub fn enabled(started_at: DateTime<Utc>, owner: Owner) -> Self {
        Self::Enabled { started_at, owner }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Disabled => None,
            Self::Enabled { started_at, .. } => Some(*started_at),
        }
    }

    pub fn owner(&self) -> &Owner {
        const UNCLAIMED: &Owner = &Owner::Unclaimed;
        match self {
            Self::Disabled => UNCLAIMED,
            Self::Enabled { owner, .. } => owner,
        }
    }

    /// Whole seconds since the session started, or 0 when disabled. Never
    /// negative, even if the clock stepped backwards.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.started_at()
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Build the in-memory state from a persisted record.
    ///
    /// Returns `true` in the second slot when the record claimed `enabled`
    /// with a missing or unparseable start time; the start time is then
    /// reset to `now` and the caller must persist the repaired state.
    pub fn from_record(record: &LiveStateRecord, now: DateTime<Utc>) -> (Self, bool) {
        if !record.enabled {
            return (Self::Disabled, false);
        }
        let owner = Owner::from_optional(record.owner.as_deref());
        match record.start_time.as_deref().and_then(parse_timestamp) {
            Some(started_at) => (Self::Enabled { started_at, owner }, false),
            None => (
                Self::Enabled {
                    started_at: now,
                    owner,
                },
                true,
            ),
        }
    }

    pub fn to_record(&self) -> LiveStateRecord {
        match self {
            Self::Disabled => LiveStateRecord::default(),
            Self::Enabled { started_at, owner } => LiveStateRecord {
                enabled: true,
                start_time: Some(format_timestamp(*started_at)),
                owner: owner.as_deref().map(str::to_string),
            },
        }
    }
}

/// The JSON object stored in `live_mode.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStateRecord {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}
