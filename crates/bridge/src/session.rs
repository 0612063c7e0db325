// crates/bridge/src/session.rs
//! Bridge-side view of the live session: acquire it at startup, keep it
//! during the evening, hand it back on shutdown.
//!
//! The server is the authority. `owned` is only this bridge's belief,
//! corrected every time [`SessionManager::reconcile`] sees the real state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::client::{LiveReply, SyncClient};
use crate::error::ClientError;

/// What a reconciliation pass found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconcile {
    /// Server agrees this bridge owns the session.
    Held,
    /// Session was off and this bridge switched it back on.
    Reacquired,
    /// Another client holds the session; left alone.
    Deferred { owner: Option<String> },
    /// Could not reach or update the server this round.
    Unreachable,
}

pub struct SessionManager {
    client: Arc<SyncClient>,
    owned: AtomicBool,
}

impl SessionManager {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self {
            client,
            owned: AtomicBool::new(false),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.owned.load(Ordering::SeqCst)
    }

    fn mine(&self, reply: &LiveReply) -> bool {
        reply.live && reply.owner.as_deref() == Some(self.client.identity().as_str())
    }

    /// One probe-then-enable round. Returns the server's answer; `owned`
    /// is updated from it.
    async fn try_acquire(&self) -> Result<LiveReply, ClientError> {
        let health = self.client.health().await?;
        tracing::debug!(status = %health.status, live = health.live_mode, "Server healthy");

        let reply = self.client.set_live(true).await?;
        let mine = self.mine(&reply);
        self.owned.store(mine, Ordering::SeqCst);
        if !mine {
            tracing::warn!(
                owner = reply.owner.as_deref().unwrap_or("<unclaimed>"),
                "Live session already held by another client"
            );
        }
        Ok(reply)
    }

    /// Startup acquisition: up to `attempts` rounds with exponential backoff
    /// between them. Stops early if another client holds the session.
    pub async fn acquire(&self, attempts: u32) -> bool {
        let (_never, stop) = watch::channel(false);
        self.acquire_until(attempts, stop).await
    }

    /// [`acquire`](Self::acquire) that gives up once `stop` turns true. The
    /// flag is only honoured between rounds: a round already talking to the
    /// server runs to completion, so an enable the server applied is always
    /// recorded as owned and released later.
    pub async fn acquire_until(&self, attempts: u32, mut stop: watch::Receiver<bool>) -> bool {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if *stop.borrow() {
                tracing::info!(attempt, "Stop requested, abandoning acquisition");
                return self.is_owner();
            }
            match self.try_acquire().await {
                Ok(_) if self.is_owner() => {
                    tracing::info!(owner = %self.client.identity(), attempt, "Live session acquired");
                    return true;
                }
                Ok(_) => return false,
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Failed to acquire live session");
                    if attempt < attempts {
                        let delay = self.client.policy().backoff(attempt);
                        tokio::select! {
                            _ = self.client.sleeper().sleep(delay) => {}
                            _ = stop.changed() => {}
                        }
                    }
                }
            }
        }
        tracing::warn!(
            attempts,
            "Live session not acquired; will keep trying on health checks"
        );
        false
    }

    /// Periodic health pass.
    pub async fn reconcile(&self) -> Reconcile {
        let status = match self.client.live_status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                return Reconcile::Unreachable;
            }
        };

        if status.live {
            if self.mine(&status) {
                self.owned.store(true, Ordering::SeqCst);
                return Reconcile::Held;
            }
            if self.owned.swap(false, Ordering::SeqCst) {
                tracing::warn!(
                    owner = status.owner.as_deref().unwrap_or("<unclaimed>"),
                    "Live session taken over by another client"
                );
            }
            return Reconcile::Deferred {
                owner: status.owner,
            };
        }

        if self.is_owner() {
            tracing::warn!("Server reports live mode off while this bridge owns it, re-acquiring");
        } else {
            tracing::info!("Live mode off, trying to acquire");
        }
        match self.try_acquire().await {
            Ok(_) if self.is_owner() => Reconcile::Reacquired,
            Ok(reply) => Reconcile::Deferred { owner: reply.owner },
            Err(e) => {
                tracing::warn!(error = %e, "Re-acquire failed");
                Reconcile::Unreachable
            }
        }
    }

    /// Switch live mode off, but only if this bridge believes it owns it.
    pub async fn release(&self) {
        if !self.owned.swap(false, Ordering::SeqCst) {
            tracing::info!("Not the session owner, leaving live mode as is");
            return;
        }
        match self.client.set_live(false).await {
            Ok(_) => tracing::info!("Live session released"),
            Err(ClientError::OwnershipConflict { owner, .. }) => {
                tracing::warn!(
                    owner = owner.as_deref().unwrap_or("<unknown>"),
                    "Session was taken over before shutdown, not disabling"
                );
            }
            Err(e) => tracing::error!(error = %e, "Failed to release live session"),
        }
    }
}
