// crates/server/src/state.rs
//! Application state for the Axum server.
//!
//! Nothing about the live session is cached here: every handler goes back to
//! the coordinator, which reads the state file on each call. That keeps
//! several server processes pointed at the same data directory in agreement.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use porchlight_core::paths::{entry_log_path, live_state_path};
use porchlight_core::{Clock, EntryLog, LiveSessionCoordinator, LiveStateStore, SystemClock};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub coordinator: LiveSessionCoordinator,
    pub entries: EntryLog,
    /// Expected `X-API-Key` value for mutating endpoints.
    pub api_key: String,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(data_dir: &Path, api_key: impl Into<String>) -> Arc<Self> {
        Self::with_clock(data_dir, api_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        data_dir: &Path,
        api_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let store = LiveStateStore::new(live_state_path(data_dir));
        Arc::new(Self {
            start_time: Instant::now(),
            coordinator: LiveSessionCoordinator::with_clock(store, clock.clone()),
            entries: EntryLog::with_clock(entry_log_path(data_dir), clock),
            api_key: api_key.into(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
