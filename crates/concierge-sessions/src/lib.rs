//! `concierge-sessions` — the `Session` record (§3 DATA MODEL), recovery
//! counters (C5), and the hybrid session store (C2).

pub mod db;
pub mod error;
pub mod manager;
pub mod recovery;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::SessionStore;
pub use recovery::{migrate_recovery_from_legacy, LegacyCounters, Recovery};
pub use types::{PendingCancelSlot, QualifData, Session};
