// crates/bridge/src/runner.rs
//! Bridge process lifecycle.
//!
//! 1. Upload anything left pending from a previous run.
//! 2. Start the device loop and the event worker straight away.
//! 3. In the background: acquire the live session, then reconcile and
//!    retry pending uploads every health interval.
//! 4. On Ctrl-C or device EOF: stop the loops, release the session if
//!    this bridge still owns it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};

use crate::bridge::{DomainEvent, EventBridge};
use crate::client::SyncClient;
use crate::config::BridgeConfig;
use crate::device::{button_decoder, open_device, run_device_loop, DeviceLines};
use crate::identity::ClientIdentity;
use crate::pending::PendingQueue;
use crate::session::{Reconcile, SessionManager};

/// Everything a running bridge needs, wired together.
pub struct Bridge {
    pub session: Arc<SessionManager>,
    pub events: Arc<EventBridge>,
    pub health_interval: Duration,
    pub acquire_attempts: u32,
    pub poll_interval: Duration,
}

impl Bridge {
    pub fn from_config(config: &BridgeConfig) -> anyhow::Result<Self> {
        let identity = ClientIdentity::generate();
        tracing::info!(identity = %identity, api_url = %config.api_url, "Bridge identity");

        let client = Arc::new(
            SyncClient::new(
                config.api_url.clone(),
                config.api_key.clone(),
                identity,
                config.retry_policy(),
                config.timeout(),
            )
            .context("building HTTP client")?,
        );
        let queue = PendingQueue::new(config.backup_path());
        tracing::info!(path = %queue.path().display(), "Local backup file");

        Ok(Self {
            session: Arc::new(SessionManager::new(client.clone())),
            events: Arc::new(EventBridge::new(client, queue, !config.no_local_backup)),
            health_interval: config.health_interval(),
            acquire_attempts: config.acquire_attempts,
            poll_interval: config.poll_interval(),
        })
    }

    /// Run until `shutdown` resolves or the device stream ends.
    pub async fn run<F>(&self, device: DeviceLines, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        match self.events.sync_pending().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(uploaded = n, "Uploaded entries left from a previous run"),
            Err(e) => tracing::warn!(error = %e, "Could not read pending queue at startup"),
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(event_worker(self.events.clone(), event_rx));
        let health = tokio::spawn(health_loop(
            self.session.clone(),
            self.events.clone(),
            self.acquire_attempts,
            self.health_interval,
            stop_rx.clone(),
        ));
        let mut device_loop = tokio::spawn(run_device_loop(
            device,
            button_decoder(&event_tx),
            stop_rx,
            self.poll_interval,
        ));
        drop(event_tx);

        let device_result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown requested");
                None
            }
            result = &mut device_loop => Some(result),
        };

        let _ = stop_tx.send(true);
        let device_result = match device_result {
            Some(result) => result,
            None => device_loop.await,
        };
        match device_result {
            Ok(presses) => tracing::info!(presses, "Device loop finished"),
            Err(e) => tracing::error!(error = %e, "Device loop panicked"),
        }

        // The decoder owned the last sender, so the worker drains and exits.
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Event worker panicked");
        }
        if let Err(e) = health.await {
            tracing::error!(error = %e, "Health loop panicked");
        }

        self.session.release().await;
        Ok(())
    }
}

async fn event_worker(events: Arc<EventBridge>, mut rx: mpsc::UnboundedReceiver<DomainEvent>) {
    while let Some(event) = rx.recv().await {
        let outcome = events.handle(event).await;
        tracing::debug!(?event, ?outcome, "Event handled");
    }
}

async fn health_loop(
    session: Arc<SessionManager>,
    events: Arc<EventBridge>,
    acquire_attempts: u32,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    // Not raced against `stop`: an in-flight enable must land in `owned`.
    session.acquire_until(acquire_attempts, stop.clone()).await;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => return,
        }
        if *stop.borrow() {
            return;
        }

        let result = session.reconcile().await;
        tracing::debug!(?result, "Reconciled live session");
        if result != Reconcile::Unreachable {
            if let Err(e) = events.sync_pending().await {
                tracing::warn!(error = %e, "Pending sync failed");
            }
        }
    }
}

/// Entry point used by `main`.
pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    config.validate()?;
    let bridge = Bridge::from_config(&config)?;
    let device = open_device(&config.port)?;
    tracing::info!(port = %config.port, "Listening for button presses");

    bridge
        .run(device, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
