//! Remote CRM API access
//!
//! This module defines the [`CrmApi`] seam the sync engine talks through and
//! an HTTP implementation for the CRM v3 REST API.
//!
//! # Components
//!
//! - [`types`]: Wire types for search, association and object batch calls
//! - [`client`]: `reqwest`-based [`HttpCrmClient`]
//!
//! The access token is passed explicitly on every call; no client-wide bearer
//! credential is kept.

pub mod client;
pub mod types;

pub use client::HttpCrmClient;
pub use types::{
    AssociationRow, CrmObject, Filter, FilterGroup, FilterOperator, NextPage, ObjectId, Paging,
    SearchPage, SearchRequest, Sort, SortDirection, TokenGrant,
};

use async_trait::async_trait;

use crate::error::{AuthError, SyncError};
use crate::models::EntityType;

/// Operations the sync engine needs from the remote CRM
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Run one filtered, sorted search page for an entity type
    async fn search(
        &self,
        access_token: &str,
        entity: EntityType,
        request: &SearchRequest,
    ) -> Result<SearchPage, SyncError>;

    /// Batch-read associations from `from` objects to `to` objects
    async fn read_associations(
        &self,
        access_token: &str,
        from: EntityType,
        to: EntityType,
        ids: &[String],
    ) -> Result<Vec<AssociationRow>, SyncError>;

    /// Batch-read objects with a fixed property projection
    async fn read_objects(
        &self,
        access_token: &str,
        entity: EntityType,
        ids: &[String],
        properties: &[String],
    ) -> Result<Vec<CrmObject>, SyncError>;

    /// Exchange a refresh token for a new access token
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, AuthError>;
}
