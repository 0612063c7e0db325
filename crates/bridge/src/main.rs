// crates/bridge/src/main.rs
//! Porchlight bridge binary.

use anyhow::Result;
use clap::Parser;
use porchlight_bridge::{runner, BridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::parse();
    let _log_guard = porchlight_observability::init_tracing(
        "warn,porchlight_bridge=info,porchlight_core=info",
        config.log_dir.as_deref(),
        "porchlight-bridge",
    )?;

    if let Err(e) = runner::run(config).await {
        tracing::error!(error = ?e, "Bridge exited with error");
        return Err(e);
    }
    tracing::info!("Bridge stopped");
    Ok(())
}
