// crates/core/src/paths.rs
//! Centralized file locations for everything Porchlight persists.
//!
//! Single source of truth so the server and the bridge never disagree about
//! file names inside a data directory.

use std::path::{Path, PathBuf};

/// Live-session record, shared by all server workers.
pub const LIVE_STATE_FILE: &str = "live_mode.json";
/// Server-side arrival log.
pub const ENTRY_LOG_FILE: &str = "trickortreat_data.json";
/// Bridge-side audit log and pending-upload queue.
pub const BRIDGE_BACKUP_FILE: &str = "trickortreat_data_backup.json";

/// Server data directory when none is configured (relative to the working dir).
pub fn default_server_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Bridge data directory: `~/.local/share/porchlight/` (Linux) or the
/// platform equivalent, falling back to `./data`.
pub fn default_bridge_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("porchlight"))
        .unwrap_or_else(default_server_data_dir)
}

/// `<data_dir>/live_mode.json`
pub fn live_state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LIVE_STATE_FILE)
}

/// `<data_dir>/trickortreat_data.json`
pub fn entry_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ENTRY_LOG_FILE)
}

/// `<data_dir>/trickortreat_data_backup.json`
pub fn bridge_backup_path(data_dir: &Path) -> PathBuf {
    data_dir.join(BRIDGE_BACKUP_FILE)
}
