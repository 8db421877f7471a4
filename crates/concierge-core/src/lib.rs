//! `concierge-core` — shared config, error taxonomy, canonical types, locale
//! tables, and audit event catalogue for the booking engine.

pub mod audit;
pub mod config;
pub mod error;
pub mod locale;
pub mod types;

pub use audit::AuditEvent;
pub use config::ConciergeConfig;
pub use error::{ConciergeError, Result};
pub use types::{
    CalendarProvider, CanonicalSlot, Channel, ConsentMode, ContactKind, SlotSource, Tenant,
    TenantId, TenantStatus, TimeOfDay,
};
