//! Dry-run wrappers
//!
//! Used when `database.dry_run` is set: tenants are still read, but nothing
//! is written back and events only go to the log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{EventSink, TenantStore};
use crate::error::{DbError, SinkError};
use crate::models::{SyncEvent, Tenant};

/// Tenant store whose saves are no-ops
pub struct DryRunStore {
    inner: Arc<dyn TenantStore>,
}

impl DryRunStore {
    pub fn new(inner: Arc<dyn TenantStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TenantStore for DryRunStore {
    async fn load_tenant(&self) -> Result<Tenant, DbError> {
        self.inner.load_tenant().await
    }

    async fn save_tenant(&self, tenant: &Tenant) -> Result<(), DbError> {
        info!(tenant_id = %tenant.id, "Dry run, tenant not saved");
        Ok(())
    }
}

/// Sink that logs batches instead of storing them
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn write(&self, api_key: &str, events: Vec<SyncEvent>) -> Result<(), SinkError> {
        let document = serde_json::to_string(&events)?;
        info!(
            api_key = api_key,
            count = events.len(),
            events = %document,
            "Dry run, events not stored"
        );
        Ok(())
    }
}
