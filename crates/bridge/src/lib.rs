// crates/bridge/src/lib.rs
//! Porchlight bridge: reads the porch button receiver and keeps the
//! dashboard in sync, surviving flaky Wi-Fi with retries and a local
//! pending queue.

pub mod bridge;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod identity;
pub mod pending;
pub mod retry;
pub mod runner;
pub mod session;

pub use bridge::{DomainEvent, EventBridge, EventOutcome};
pub use client::SyncClient;
pub use config::BridgeConfig;
pub use error::{ClientError, PendingQueueError};
pub use identity::ClientIdentity;
pub use pending::{PendingEntry, PendingQueue};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{Reconcile, SessionManager};
