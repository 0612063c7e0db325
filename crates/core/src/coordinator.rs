// crates/core/src/coordinator.rs
//! The live-session state machine.
//!
//! Every call is a self-contained "load from disk → decide → atomically
//! persist → re-read" cycle. Server workers share nothing but the state
//! file, so there is no in-process cache and no lock: two workers racing to
//! enable will both succeed and the last rename wins. Ownership is advisory;
//! it only gates *disabling* someone else's session.
//!
//! ```text
//!            enable(owner)                     disable(owner | none)
//! Disabled ───────────────▶ Enabled{owner} ───────────────────────▶ Disabled
//!     ▲  enable / disable     │  enable: no-op
//!     └──── no-op ────────────┘  disable(other owner): rejected, unchanged
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::live_state::{LiveSessionState, Owner};
use crate::store::LiveStateStore;

/// What read-only consumers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStatus {
    pub enabled: bool,
    pub elapsed_seconds: u64,
    pub owner: Owner,
}

impl LiveStatus {
    /// The fail-safe answer when the record cannot be read.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            elapsed_seconds: 0,
            owner: Owner::Unclaimed,
        }
    }
}

/// A well-formed transition request refused by policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejection {
    #[error("Cannot disable - owned by different client")]
    OwnershipConflict {
        current_owner: String,
        requested_by: String,
    },
}

/// Result of [`LiveSessionCoordinator::request_transition`].
///
/// A rejected request still carries the (unchanged) current status; callers
/// must check `rejection` rather than infer success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status: LiveStatus,
    pub changed: bool,
    pub rejection: Option<TransitionRejection>,
}

#[derive(Clone)]
pub struct LiveSessionCoordinator {
    store: LiveStateStore,
    clock: Arc<dyn Clock>,
}

impl LiveSessionCoordinator {
    pub fn new(store: LiveStateStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: LiveStateStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &LiveStateStore {
        &self.store
    }

    fn status_of(&self, state: &LiveSessionState) -> LiveStatus {
        LiveStatus {
            enabled: state.is_enabled(),
            elapsed_seconds: state.elapsed_seconds(self.clock.now()),
            owner: state.owner().clone(),
        }
    }

    /// Current state straight from disk (with self-repair).
    pub fn state(&self) -> Result<LiveSessionState, StoreError> {
        self.store.load(self.clock.now())
    }

    /// Current status. Never fails: any read problem reports "disabled".
    pub fn status(&self) -> LiveStatus {
        match self.state() {
            Ok(state) => self.status_of(&state),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read live state, reporting disabled");
                LiveStatus::disabled()
            }
        }
    }

    /// Like [`status`](Self::status) but never writes: a missing record is
    /// not created and a broken one is not repaired. For health probes.
    pub fn peek(&self) -> LiveStatus {
        match self.store.read_record() {
            Ok(Some(record)) => {
                let now = self.clock.now();
                let (state, _) = LiveSessionState::from_record(&record, now);
                self.status_of(&state)
            }
            Ok(None) => LiveStatus::disabled(),
            Err(e) => {
                tracing::debug!(error = %e, "Live state unreadable during peek");
                LiveStatus::disabled()
            }
        }
    }

    /// Move the session toward `desired`, on behalf of `requester`.
    ///
    /// Persistence failures are returned as errors. An ownership conflict is
    /// not an error: it comes back as `Ok` with `rejection` set and the state
    /// untouched.
    pub fn request_transition(
        &self,
        desired: bool,
        requester: Owner,
    ) -> Result<TransitionOutcome, StoreError> {
        let now = self.clock.now();
        let current = match self.store.load(now) {
            Ok(state) => state,
            Err(e) if e.is_corrupt() => {
                tracing::warn!(error = %e, "Live state unreadable, treating as disabled");
                LiveSessionState::Disabled
            }
            Err(e) => return Err(e),
        };

        let next = match (&current, desired) {
            (LiveSessionState::Disabled, true) => {
                tracing::info!(owner = %requester, "Live mode ENABLED");
                LiveSessionState::enabled(now, requester)
            }
            (LiveSessionState::Enabled { owner, .. }, false) => {
                if owner.conflicts_with(&requester) {
                    tracing::warn!(
                        requested_by = %requester,
                        current_owner = %owner,
                        "Rejecting live disable from non-owner"
                    );
                    let rejection = TransitionRejection::OwnershipConflict {
                        current_owner: owner.to_string(),
                        requested_by: requester.to_string(),
                    };
                    return Ok(TransitionOutcome {
                        status: self.status_of(&current),
                        changed: false,
                        rejection: Some(rejection),
                    });
                }
                tracing::info!(requested_by = %requester, "Live mode DISABLED");
                LiveSessionState::Disabled
            }
            _ => {
                tracing::debug!(desired, "Live mode already in requested state");
                return Ok(TransitionOutcome {
                    status: self.status_of(&current),
                    changed: false,
                    rejection: None,
                });
            }
        };

        self.store.save(&next)?;

        // Read back what is actually on disk; another worker may have
        // replaced the record between our save and this load.
        let persisted = self.store.load(self.clock.now())?;
        if persisted != next {
            tracing::warn!(
                expected_enabled = next.is_enabled(),
                persisted_enabled = persisted.is_enabled(),
                "Live state replaced by a concurrent writer"
            );
        }

        Ok(TransitionOutcome {
            status: self.status_of(&persisted),
            changed: true,
            rejection: None,
        })
    }
}
