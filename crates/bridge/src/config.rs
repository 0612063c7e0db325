// crates/bridge/src/config.rs
//! Command-line and environment configuration for `porchlight-bridge`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use porchlight_core::paths::{bridge_backup_path, default_bridge_data_dir};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "porchlight-bridge",
    version,
    about = "Forwards porch button presses to the Porchlight dashboard"
)]
pub struct BridgeConfig {
    /// Dashboard base URL, e.g. `https://porch.example.com`.
    #[arg(long, env = "DASHBOARD_API_URL")]
    pub api_url: String,

    #[arg(long, env = "DASHBOARD_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Receiver device path, or `-` to read lines from stdin.
    #[arg(long, env = "SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    pub port: String,

    /// Where the local backup file lives.
    #[arg(long, env = "PORCHLIGHT_BRIDGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout.
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Attempts per call, including the first.
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 500)]
    pub base_delay_ms: u64,

    #[arg(long, default_value_t = 8000)]
    pub max_delay_ms: u64,

    /// Seconds between health and ownership checks.
    #[arg(long, default_value_t = 60)]
    pub health_interval_secs: u64,

    /// Acquisition rounds at startup.
    #[arg(long, default_value_t = 5)]
    pub acquire_attempts: u32,

    /// How often the device loop checks for shutdown.
    #[arg(long, default_value_t = 200)]
    pub poll_interval_ms: u64,

    /// Do not keep an audit record of confirmed presses.
    #[arg(long)]
    pub no_local_backup: bool,

    /// Also write daily-rotated log files here.
    #[arg(long, env = "PORCHLIGHT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("DASHBOARD_API_URL must start with http:// or https://");
        }
        if self.api_key.trim().is_empty() {
            anyhow::bail!("DASHBOARD_API_KEY must not be empty");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    /// Clamped to the 0.1-0.5 s range.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(100, 500))
    }

    pub fn backup_path(&self) -> PathBuf {
        let dir = self.data_dir.clone().unwrap_or_else(default_bridge_data_dir);
        bridge_backup_path(&dir)
    }
}
