//! Access token management
//!
//! The access token of each account lives in [`Account::token`] for the
//! duration of a run and is handed to every CRM call explicitly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::retry::RetryRecovery;
use crate::config::CrmConfig;
use crate::crm::CrmApi;
use crate::error::AuthError;
use crate::models::Account;

/// Refreshes account access tokens against the OAuth token endpoint
pub struct CredentialManager {
    api: Arc<dyn CrmApi>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl CredentialManager {
    /// Create a credential manager using the process-wide OAuth client
    pub fn new(api: Arc<dyn CrmApi>, config: &CrmConfig) -> Self {
        Self {
            api,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Return a usable access token, refreshing first if it has expired
    pub async fn ensure_valid_token(&self, account: &mut Account) -> Result<String, AuthError> {
        if account.token.is_expired(Utc::now()) {
            self.refresh(account).await?;
        }
        Ok(account.token.access_token().to_string())
    }

    /// Exchange the account's refresh token for a new access token
    ///
    /// Expiry is recomputed as `now + expires_in`. A rotated refresh token
    /// replaces the stored one.
    pub async fn refresh(&self, account: &mut Account) -> Result<(), AuthError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => return Err(AuthError::MissingClientCredentials),
        };
        let refresh_token = account
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::MissingRefreshToken(account.hub_id.clone()))?;

        let grant = self
            .api
            .refresh_token(client_id, client_secret, refresh_token)
            .await?;

        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);
        account.token.update(grant.access_token, expires_at);
        if let Some(rotated) = grant.refresh_token {
            account.refresh_token = Some(rotated);
        }

        info!(
            hub_id = %account.hub_id,
            expires_at = %expires_at,
            "Access token refreshed"
        );
        Ok(())
    }
}

/// One account's view of the credential manager during a pagination loop
///
/// Used as the retry recovery hook: after a failed attempt the token is
/// refreshed if it has expired, and any refresh error is swallowed.
pub struct AccountSession<'a> {
    credentials: &'a CredentialManager,
    account: &'a mut Account,
}

impl<'a> AccountSession<'a> {
    pub fn new(credentials: &'a CredentialManager, account: &'a mut Account) -> Self {
        Self {
            credentials,
            account,
        }
    }

    /// Current bearer token
    pub fn access_token(&self) -> &str {
        self.account.token.access_token()
    }

    pub fn account(&self) -> &Account {
        &*self.account
    }

    pub fn account_mut(&mut self) -> &mut Account {
        &mut *self.account
    }
}

#[async_trait]
impl RetryRecovery for AccountSession<'_> {
    async fn recover(&mut self) {
        if !self.account.token.is_expired(Utc::now()) {
            return;
        }
        if let Err(err) = self.credentials.refresh(&mut *self.account).await {
            warn!(
                hub_id = %self.account.hub_id,
                error = %err,
                "Token refresh during retry failed"
            );
        }
    }
}
