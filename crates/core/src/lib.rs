// crates/core/src/lib.rs
//! Porchlight core: the live-session record, its file-backed store, the
//! coordinator that arbitrates transitions, the server-side entry log and
//! the device line decoder.

pub mod clock;
pub mod coordinator;
pub mod decoder;
pub mod entries;
pub mod error;
pub mod live_state;
pub mod paths;
pub mod store;
pub mod time;

pub use clock::{Clock, SystemClock};
pub use coordinator::{LiveSessionCoordinator, LiveStatus, TransitionOutcome, TransitionRejection};
pub use decoder::{decode_line, Dispatch, DeviceMessage, EventDecoder};
pub use entries::{parse_records, Entry, EntryLog, RawEntry};
pub use error::*;
pub use live_state::{LiveSessionState, Owner};
pub use store::LiveStateStore;
