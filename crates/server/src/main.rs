// crates/server/src/main.rs
//! Porchlight server binary.

use anyhow::{Context, Result};
use clap::Parser;
use porchlight_server::{create_app, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    let _log_guard = porchlight_observability::init_tracing(
        "warn,porchlight_server=info,porchlight_core=info,tower_http=info",
        config.log_dir.as_deref(),
        "porchlight-server",
    )?;
    config.validate()?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

    let state = AppState::new(&config.data_dir, config.api_key.clone());
    let initial = state.coordinator.status();
    tracing::info!(
        live = initial.enabled,
        owner = %initial.owner,
        data_dir = %config.data_dir.display(),
        "Live state loaded"
    );

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, "Porchlight server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
