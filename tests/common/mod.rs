//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crm_sync::config::{Config, CrmConfig, RetryConfig};
use crm_sync::crm::{
    AssociationRow, CrmApi, CrmObject, NextPage, ObjectId, Paging, SearchPage, SearchRequest,
    TokenGrant,
};
use crm_sync::database::{EventSink, SqliteDatabase};
use crm_sync::error::{AuthError, SinkError, SyncError};
use crm_sync::models::{EntityType, SyncEvent};

/// Midnight UTC on the given day of January 2024
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

/// Configuration with OAuth credentials and no backoff
pub fn test_config() -> Config {
    Config {
        crm: CrmConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..CrmConfig::default()
        },
        retry: RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 0,
            backoff_multiplier: 2,
        },
        ..Config::default()
    }
}

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::new(":memory:")
            .await
            .expect("Failed to create test database"),
    )
}

fn object(
    id: &str,
    properties: serde_json::Value,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> CrmObject {
    let serde_json::Value::Object(properties) = properties else {
        panic!("properties must be an object");
    };
    CrmObject {
        id: id.to_string(),
        properties: Some(properties),
        created_at: Some(created),
        updated_at: Some(updated),
    }
}

pub fn contact(
    id: &str,
    email: Option<&str>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> CrmObject {
    object(
        id,
        json!({ "firstname": "Ada", "lastname": "Lovelace", "email": email, "hubspotscore": "12" }),
        created,
        updated,
    )
}

pub fn company(
    id: &str,
    domain: &str,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> CrmObject {
    object(
        id,
        json!({ "name": "Acme", "domain": domain, "industry": "Software" }),
        created,
        updated,
    )
}

pub fn meeting(id: &str, title: &str, created: DateTime<Utc>, updated: DateTime<Utc>) -> CrmObject {
    object(
        id,
        json!({ "hs_meeting_title": title, "hs_timestamp": "2024-01-05T10:00:00Z" }),
        created,
        updated,
    )
}

pub fn page(results: Vec<CrmObject>, after: Option<&str>) -> SearchPage {
    SearchPage {
        results,
        paging: after.map(|a| Paging {
            next: Some(NextPage {
                after: Some(a.to_string()),
            }),
        }),
    }
}

/// In-process CRM with scripted search pages and association data
#[derive(Default)]
pub struct FakeCrm {
    pages: Mutex<HashMap<EntityType, VecDeque<SearchPage>>>,
    failing: HashSet<EntityType>,
    refresh_fails: bool,
    contact_companies: HashMap<String, Vec<String>>,
    meeting_contacts: HashMap<String, Vec<String>>,
    contact_emails: HashMap<String, String>,
    searches: Mutex<Vec<(EntityType, SearchRequest)>>,
    refreshes: AtomicU32,
}

impl FakeCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a search page for an entity type; an empty page is served once the queue runs dry
    pub fn with_page(self, entity: EntityType, page: SearchPage) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(entity)
            .or_default()
            .push_back(page);
        self
    }

    /// Make every search for an entity type fail
    pub fn failing(mut self, entity: EntityType) -> Self {
        self.failing.insert(entity);
        self
    }

    /// Make the token endpoint reject every exchange
    pub fn refresh_failing(mut self) -> Self {
        self.refresh_fails = true;
        self
    }

    pub fn with_contact_companies(mut self, contact_id: &str, company_ids: &[&str]) -> Self {
        self.contact_companies.insert(
            contact_id.to_string(),
            company_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn with_attendee(mut self, meeting_id: &str, contact_id: &str, email: &str) -> Self {
        self.meeting_contacts
            .entry(meeting_id.to_string())
            .or_default()
            .push(contact_id.to_string());
        self.contact_emails
            .insert(contact_id.to_string(), email.to_string());
        self
    }

    /// Search requests received so far
    pub fn searches(&self, entity: EntityType) -> Vec<SearchRequest> {
        self.searches
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == entity)
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrmApi for FakeCrm {
    async fn search(
        &self,
        _access_token: &str,
        entity: EntityType,
        request: &SearchRequest,
    ) -> Result<SearchPage, SyncError> {
        self.searches
            .lock()
            .unwrap()
            .push((entity, request.clone()));

        if self.failing.contains(&entity) {
            return Err(SyncError::ServerError(500));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get_mut(&entity)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }

    async fn read_associations(
        &self,
        _access_token: &str,
        from: EntityType,
        _to: EntityType,
        ids: &[String],
    ) -> Result<Vec<AssociationRow>, SyncError> {
        let source = match from {
            EntityType::Contact => &self.contact_companies,
            EntityType::Meeting => &self.meeting_contacts,
            EntityType::Company => return Ok(Vec::new()),
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                source.get(id).map(|targets| AssociationRow {
                    from: Some(ObjectId { id: id.clone() }),
                    to: targets
                        .iter()
                        .map(|t| ObjectId { id: t.clone() })
                        .collect(),
                })
            })
            .collect())
    }

    async fn read_objects(
        &self,
        _access_token: &str,
        _entity: EntityType,
        ids: &[String],
        _properties: &[String],
    ) -> Result<Vec<CrmObject>, SyncError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.contact_emails
                    .get(id)
                    .map(|email| contact(id, Some(email), day(1), day(1)))
            })
            .collect())
    }

    async fn refresh_token(
        &self,
        _client_id: &str,
        _client_secret: &str,
        _refresh_token: &str,
    ) -> Result<TokenGrant, AuthError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.refresh_fails {
            return Err(AuthError::RefreshFailed("HTTP 400".to_string()));
        }
        Ok(TokenGrant {
            access_token: format!("access-{}", n),
            refresh_token: None,
            expires_in: 1800,
        })
    }
}

/// Sink that keeps every batch in memory
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<(String, Vec<SyncEvent>)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, events)| events.clone())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, events)| events.len())
            .collect()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn write(&self, api_key: &str, events: Vec<SyncEvent>) -> Result<(), SinkError> {
        self.batches
            .lock()
            .unwrap()
            .push((api_key.to_string(), events));
        Ok(())
    }
}
