// crates/bridge/src/bridge.rs
//! Turns button presses into dashboard mutations, falling back to the local
//! pending queue when the server cannot confirm them.

use std::sync::Arc;

use porchlight_core::{Clock, SystemClock};

use crate::client::SyncClient;
use crate::error::PendingQueueError;
use crate::pending::{PendingEntry, PendingQueue};

/// A press, after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    /// Button 1.
    AddOne,
    /// Button 3.
    UndoLast,
}

/// What became of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Server applied it.
    Confirmed,
    /// Server unreachable; stored locally for the next batch upload.
    Queued,
    /// Undo while offline removed a press that was still queued.
    CancelledPending,
    /// Nothing could be recorded.
    Dropped,
}

pub struct EventBridge {
    client: Arc<SyncClient>,
    queue: PendingQueue,
    local_backup: bool,
    clock: Arc<dyn Clock>,
}

impl EventBridge {
    pub fn new(client: Arc<SyncClient>, queue: PendingQueue, local_backup: bool) -> Self {
        Self::with_clock(client, queue, local_backup, Arc::new(SystemClock))
    }

    pub fn with_clock(
        client: Arc<SyncClient>,
        queue: PendingQueue,
        local_backup: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            queue,
            local_backup,
            clock,
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    async fn with_queue<T, F>(&self, f: F) -> Result<T, PendingQueueError>
    where
        F: FnOnce(&PendingQueue) -> Result<T, PendingQueueError> + Send + 'static,
        T: Send + 'static,
    {
        let queue = self.queue.clone();
        tokio::task::spawn_blocking(move || f(&queue))
            .await
            .map_err(|e| PendingQueueError::Task(e.to_string()))?
    }

    pub async fn handle(&self, event: DomainEvent) -> EventOutcome {
        match event {
            DomainEvent::AddOne => self.add_one().await,
            DomainEvent::UndoLast => self.undo_last().await,
        }
    }

    async fn add_one(&self) -> EventOutcome {
        let pressed_at = self.clock.now();
        match self.client.add_entry().await {
            Ok(reply) => {
                tracing::info!(total = reply.total_count, "Arrival recorded");
                if self.local_backup {
                    let entry = PendingEntry::press(pressed_at, false);
                    if let Err(e) = self.with_queue(move |q| q.append(entry)).await {
                        tracing::warn!(error = %e, "Failed to write local audit record");
                    }
                }
                EventOutcome::Confirmed
            }
            Err(err) => {
                tracing::warn!(error = %err, "Arrival not confirmed, queueing for upload");
                let entry = PendingEntry::press(pressed_at, true);
                match self.with_queue(move |q| q.append(entry)).await {
                    Ok(()) => EventOutcome::Queued,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to queue arrival, press lost");
                        EventOutcome::Dropped
                    }
                }
            }
        }
    }

    async fn undo_last(&self) -> EventOutcome {
        match self.client.undo_last_entry().await {
            Ok(reply) => {
                tracing::info!(total = reply.total_count, "Last arrival undone");
                if self.local_backup {
                    if let Err(e) = self.with_queue(|q| q.remove_latest_confirmed()).await {
                        tracing::warn!(error = %e, "Failed to update local audit log");
                    }
                }
                EventOutcome::Confirmed
            }
            Err(err) => {
                tracing::warn!(error = %err, "Undo not confirmed by server");
                match self.with_queue(|q| q.cancel_latest_pending()).await {
                    Ok(Some(entry)) => {
                        tracing::info!(timestamp = %entry.timestamp, "Cancelled queued arrival");
                        EventOutcome::CancelledPending
                    }
                    Ok(None) => {
                        tracing::warn!("Nothing queued to cancel, undo dropped");
                        EventOutcome::Dropped
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read pending queue, undo dropped");
                        EventOutcome::Dropped
                    }
                }
            }
        }
    }

    /// Upload every queued press as one batch. Flags are cleared only for
    /// the records in that batch, and only after the server accepts it.
    pub async fn sync_pending(&self) -> Result<usize, PendingQueueError> {
        let pending = self.with_queue(|q| q.pending()).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        match self.client.upload_batch(&pending).await {
            Ok(reply) => {
                if reply.rejected > 0 {
                    tracing::warn!(rejected = reply.rejected, "Server discarded some queued entries");
                }
                let cleared = self.with_queue(move |q| q.mark_uploaded(&pending)).await?;
                tracing::info!(
                    uploaded = cleared,
                    total = reply.total_count,
                    "Pending entries synced"
                );
                Ok(cleared)
            }
            Err(e) => {
                tracing::warn!(pending = pending.len(), error = %e, "Pending upload failed, will retry later");
                Ok(0)
            }
        }
    }
}
