//! Tenant and CRM account models
//!
//! A tenant owns one or more CRM accounts. Watermarks are persisted with the
//! tenant document; the access token and its expiry live only in memory for
//! the duration of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityType;

/// Tenant document read at the start of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Tenant identifier
    pub id: String,

    /// API key used for sink attribution
    pub api_key: String,

    /// Connected CRM accounts
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Tenant {
    /// Create a tenant with no accounts
    pub fn new(id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_key: api_key.into(),
            accounts: Vec::new(),
        }
    }

    /// Add an account
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Find an account by its hub ID
    pub fn account(&self, hub_id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.hub_id == hub_id)
    }
}

/// One connected CRM account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// CRM account identifier
    pub hub_id: String,

    /// OAuth refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Per-entity-type watermarks
    #[serde(default)]
    pub last_pulled_dates: LastPulledDates,

    /// In-memory access token state, never persisted
    #[serde(skip)]
    pub token: TokenState,
}

impl Account {
    /// Create an account with a refresh token and no watermarks
    pub fn new(hub_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            refresh_token: Some(refresh_token.into()),
            last_pulled_dates: LastPulledDates::default(),
            token: TokenState::default(),
        }
    }

    /// Watermark for an entity type
    pub fn watermark(&self, entity: EntityType) -> Option<DateTime<Utc>> {
        self.last_pulled_dates.get(entity)
    }

    /// Advance the watermark for an entity type
    pub fn set_watermark(&mut self, entity: EntityType, at: DateTime<Utc>) {
        self.last_pulled_dates.set(entity, at);
    }
}

/// Last-synced instant per entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPulledDates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meetings: Option<DateTime<Utc>>,
}

impl LastPulledDates {
    /// Get the watermark for an entity type
    pub fn get(&self, entity: EntityType) -> Option<DateTime<Utc>> {
        match entity {
            EntityType::Company => self.companies,
            EntityType::Contact => self.contacts,
            EntityType::Meeting => self.meetings,
        }
    }

    /// Set the watermark for an entity type
    pub fn set(&mut self, entity: EntityType, at: DateTime<Utc>) {
        let slot = match entity {
            EntityType::Company => &mut self.companies,
            EntityType::Contact => &mut self.contacts,
            EntityType::Meeting => &mut self.meetings,
        };
        *slot = Some(at);
    }
}

/// Current access token and its tracked expiry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Create a token state with a known expiry
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            expires_at: Some(expires_at),
        }
    }

    /// Bearer token to send, empty before the first refresh
    pub fn access_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or_default()
    }

    /// Tracked expiry instant
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True if no refresh happened yet or `now` is past the tracked expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    /// Store a freshly exchanged token
    pub fn update(&mut self, access_token: String, expires_at: DateTime<Utc>) {
        self.access_token = Some(access_token);
        self.expires_at = Some(expires_at);
    }
}
