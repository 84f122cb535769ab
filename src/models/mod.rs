//! Domain models for crm-sync
//!
//! This module contains the core domain models used throughout the sync engine.

pub mod event;
pub mod record;
pub mod tenant;

// Re-export commonly used types
pub use event::{
    ActionKind, CompanyEventProperties, EventProperties, MeetingEventProperties, PropertyMap,
    SyncEvent,
};
pub use record::{
    CompanyProperties, ContactProperties, EntityType, MeetingProperties, RawRecord,
    RecordProperties,
};
pub use tenant::{Account, LastPulledDates, Tenant, TokenState};
