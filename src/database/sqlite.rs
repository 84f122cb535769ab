//! SQLite implementation of the tenant store and event sink
//!
//! This module provides a SQLite-based implementation using rusqlite and
//! tokio-rusqlite for async operations. Tenants are stored as JSON documents.

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use super::migrations::CREATE_SCHEMA;
use super::{EventSink, TenantStore};
use crate::error::{DbError, SinkError};
use crate::models::{SyncEvent, Tenant};

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
    tenant_id: Option<String>,
}

/// One `actions` row ready for insertion
struct ActionRow {
    action_name: String,
    action_date: String,
    identity: Option<String>,
    document: String,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            tenant_id: None,
        })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }

    /// Select the tenant `load_tenant` returns; the first stored one otherwise
    pub fn with_tenant_id(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Events written for a tenant, in insertion order
    pub async fn list_actions(&self, api_key: &str) -> Result<Vec<SyncEvent>, DbError> {
        let api_key = api_key.to_string();

        let documents = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT document FROM actions WHERE api_key = ?1 ORDER BY id")?;
                let documents = stmt
                    .query_map([&api_key], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(documents)
            })
            .await?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).map_err(DbError::from))
            .collect()
    }

    /// Total number of stored events
    pub async fn count_actions(&self) -> Result<u64, DbError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TenantStore for SqliteDatabase {
    async fn load_tenant(&self) -> Result<Tenant, DbError> {
        let tenant_id = self.tenant_id.clone();

        let document = self
            .conn
            .call(move |conn| {
                let document = match tenant_id {
                    Some(id) => conn
                        .query_row(
                            "SELECT document FROM tenants WHERE id = ?1",
                            [&id],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?,
                    None => conn
                        .query_row(
                            "SELECT document FROM tenants ORDER BY id LIMIT 1",
                            [],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?,
                };
                Ok(document)
            })
            .await?;

        let document = document.ok_or(DbError::NotFound)?;
        Ok(serde_json::from_str(&document)?)
    }

    async fn save_tenant(&self, tenant: &Tenant) -> Result<(), DbError> {
        let id = tenant.id.clone();
        let api_key = tenant.api_key.clone();
        let document = serde_json::to_string(tenant)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO tenants (id, api_key, document, updated_at)
                    VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
                    ON CONFLICT(id) DO UPDATE SET
                        api_key = excluded.api_key,
                        document = excluded.document,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                    rusqlite::params![id, api_key, document],
                )?;
                Ok(())
            })
            .await?;

        debug!(tenant_id = %tenant.id, "Tenant saved");
        Ok(())
    }
}

#[async_trait]
impl EventSink for SqliteDatabase {
    async fn write(&self, api_key: &str, events: Vec<SyncEvent>) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }

        let rows = events
            .iter()
            .map(|event| {
                Ok(ActionRow {
                    action_name: event.action_name.clone(),
                    action_date: event.action_date.to_rfc3339(),
                    identity: event.identity.clone(),
                    document: serde_json::to_string(event)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        let api_key = api_key.to_string();
        let count = rows.len();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"
                        INSERT INTO actions (api_key, action_name, action_date, identity, document)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                    )?;
                    for row in &rows {
                        stmt.execute(rusqlite::params![
                            api_key,
                            row.action_name,
                            row.action_date,
                            row.identity,
                            row.document
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(DbError::from)?;

        debug!(count = count, "Events written");
        Ok(())
    }
}
