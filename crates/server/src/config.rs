// crates/server/src/config.rs
//! Command-line and environment configuration for `porchlight-server`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "porchlight-server", version, about = "Porchlight dashboard API")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "PORCHLIGHT_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory holding `live_mode.json` and the entry log.
    #[arg(long, env = "PORCHLIGHT_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Shared secret expected in `X-API-Key` on mutating endpoints.
    #[arg(long, env = "DASHBOARD_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Also write daily-rotated log files here.
    #[arg(long, env = "PORCHLIGHT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("DASHBOARD_API_KEY must not be empty");
        }
        Ok(())
    }
}
