//! HTTP client for the CRM v3 REST API
//!
//! Maps HTTP statuses onto [`SyncError`] the same way for every call so the
//! fetcher can treat failures uniformly for retry purposes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{BatchInputs, BatchResponse};
use super::{AssociationRow, CrmApi, CrmObject, SearchPage, SearchRequest, TokenGrant};
use crate::config::CrmConfig;
use crate::error::{AuthError, SyncError};
use crate::models::EntityType;

/// Wait reported for a 429 without a usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// `reqwest`-backed [`CrmApi`] implementation
#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    client: Client,
    api_base_url: String,
    token_url: String,
}

impl HttpCrmClient {
    /// Create a client from configuration
    pub fn new(config: &CrmConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client with a custom reqwest Client
    pub fn with_client(client: Client, config: &CrmConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
        }
    }

    async fn post_json<B, T>(&self, url: &str, access_token: &str, body: &B) -> Result<T, SyncError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!(url = url, "Sending CRM API request");

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let response = check_status(url, response)?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::InvalidData(e.to_string()))
    }
}

/// Map non-success statuses to [`SyncError`]
fn check_status(url: &str, response: Response) -> Result<Response, SyncError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::TOO_MANY_REQUESTS => {
            let wait = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            warn!(url = url, retry_after = wait, "Rate limited by CRM");
            Err(SyncError::RateLimited(wait))
        }
        StatusCode::NOT_FOUND => {
            debug!(url = url, "Resource not found (404)");
            Err(SyncError::NotFound)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(url = url, status = ?response.status(), "Unauthorized");
            Err(SyncError::Unauthorized)
        }
        status => {
            warn!(url = url, status = status.as_u16(), "Unexpected status");
            Err(SyncError::ServerError(status.as_u16()))
        }
    }
}

#[async_trait]
impl CrmApi for HttpCrmClient {
    async fn search(
        &self,
        access_token: &str,
        entity: EntityType,
        request: &SearchRequest,
    ) -> Result<SearchPage, SyncError> {
        let url = format!(
            "{}/crm/v3/objects/{}/search",
            self.api_base_url,
            entity.object_path()
        );
        self.post_json(&url, access_token, request).await
    }

    async fn read_associations(
        &self,
        access_token: &str,
        from: EntityType,
        to: EntityType,
        ids: &[String],
    ) -> Result<Vec<AssociationRow>, SyncError> {
        let url = format!(
            "{}/crm/v3/associations/{}/{}/batch/read",
            self.api_base_url,
            from.association_name(),
            to.association_name()
        );
        let body = BatchInputs::new(ids, None);
        let response: BatchResponse<AssociationRow> =
            self.post_json(&url, access_token, &body).await?;
        Ok(response.results)
    }

    async fn read_objects(
        &self,
        access_token: &str,
        entity: EntityType,
        ids: &[String],
        properties: &[String],
    ) -> Result<Vec<CrmObject>, SyncError> {
        let url = format!(
            "{}/crm/v3/objects/{}/batch/read",
            self.api_base_url,
            entity.object_path()
        );
        let body = BatchInputs::new(ids, Some(properties));
        let response: BatchResponse<CrmObject> = self.post_json(&url, access_token, &body).await?;
        Ok(response.results)
    }

    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))
    }
}
