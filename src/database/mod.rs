//! Persistence layer for crm-sync
//!
//! This module defines the tenant store and event sink traits and their
//! SQLite and dry-run implementations.

pub mod dry_run;
pub mod migrations;
pub mod sqlite;

pub use dry_run::{DryRunStore, LogSink};
pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::{DbError, SinkError};
use crate::models::{SyncEvent, Tenant};

/// Store for the tenant document processed by a run
///
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Load the tenant to synchronize
    async fn load_tenant(&self) -> Result<Tenant, DbError>;

    /// Persist accounts and watermarks of a tenant
    async fn save_tenant(&self, tenant: &Tenant) -> Result<(), DbError>;
}

/// Bulk writer for sync events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write an ordered batch of events attributed to a tenant API key
    async fn write(&self, api_key: &str, events: Vec<SyncEvent>) -> Result<(), SinkError>;
}
