//! End-to-end tests over HTTP
//!
//! Drives the orchestrator through the real `HttpCrmClient` against a
//! wiremock CRM, with SQLite as both tenant store and event sink.

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{create_test_database, day, test_config};
use crm_sync::config::Config;
use crm_sync::crm::HttpCrmClient;
use crm_sync::database::{EventSink, TenantStore};
use crm_sync::models::{Account, EntityType, Tenant};
use crm_sync::sync::{SyncOrchestrator, SyncPhase};

fn config_for(server: &MockServer) -> Config {
    let mut config = test_config();
    config.crm.api_base_url = server.uri();
    config.crm.token_url = format!("{}/oauth/v1/token", server.uri());
    config
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "rotated",
            "expires_in": 1800
        })))
        .mount(server)
        .await;
}

async fn mount_empty_search(server: &MockServer, object: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/crm/v3/objects/{}/search", object)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(server)
        .await;
}

fn seeded_tenant() -> Tenant {
    let mut account = Account::new("42", "refresh-1");
    account.set_watermark(EntityType::Contact, day(10));
    Tenant::new("t1", "key-1").with_account(account)
}

/// Test 1: Contacts flow from search through association lookup into SQLite
#[tokio::test]
async fn test_contact_sync_over_http() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "101",
                "properties": {
                    "firstname": "Grace",
                    "lastname": "Hopper",
                    "email": "grace@example.com",
                    "jobtitle": "Rear Admiral",
                    "hubspotscore": 7
                },
                "createdAt": "2024-01-11T00:00:00Z",
                "updatedAt": "2024-01-12T00:00:00Z"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/associations/CONTACTS/COMPANIES/batch/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "from": { "id": "101" }, "to": [{ "id": "900" }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_empty_search(&server, "companies").await;
    mount_empty_search(&server, "meetings").await;

    let db = create_test_database().await;
    db.save_tenant(&seeded_tenant()).await.unwrap();
    let api = Arc::new(HttpCrmClient::new(&config_for(&server).crm).unwrap());
    let sink: Arc<dyn EventSink> = db.clone();

    let summary = SyncOrchestrator::new(&config_for(&server), api, db.clone(), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.failed_phases(), 0);

    let actions = db.list_actions("key-1").await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_name, "Contact Created");
    assert_eq!(actions[0].identity.as_deref(), Some("grace@example.com"));

    let document = serde_json::to_value(&actions[0]).unwrap();
    assert_eq!(document["userProperties"]["company_id"], json!("900"));
    assert_eq!(document["userProperties"]["contact_title"], json!("Rear Admiral"));
    assert_eq!(document["userProperties"]["contact_score"], json!(7));
    assert_eq!(document["includeInAnalytics"], json!(0));

    let stored = db.load_tenant().await.unwrap();
    let account = stored.account("42").unwrap();
    assert_eq!(account.refresh_token.as_deref(), Some("rotated"));
    assert!(account.watermark(EntityType::Contact).unwrap() > day(10));
}

/// Test 2: A transient server error is retried within the same phase
#[tokio::test]
async fn test_transient_search_error_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/companies/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/companies/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "900",
                "properties": { "name": "Acme", "domain": "acme.io", "industry": "Software" },
                "createdAt": "2024-01-11T00:00:00Z",
                "updatedAt": "2024-01-11T00:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    mount_empty_search(&server, "contacts").await;
    mount_empty_search(&server, "meetings").await;

    let db = create_test_database().await;
    db.save_tenant(&seeded_tenant()).await.unwrap();
    let api = Arc::new(HttpCrmClient::new(&config_for(&server).crm).unwrap());
    let sink: Arc<dyn EventSink> = db.clone();

    let summary = SyncOrchestrator::new(&config_for(&server), api, db.clone(), sink)
        .run()
        .await
        .unwrap();

    assert!(summary.accounts[0]
        .phase(SyncPhase::FetchingCompanies)
        .unwrap()
        .succeeded());

    let actions = db.list_actions("key-1").await.unwrap();
    assert_eq!(actions.len(), 1);
    let document = serde_json::to_value(&actions[0]).unwrap();
    assert_eq!(document["companyProperties"]["company_domain"], json!("acme.io"));
}

/// Test 3: A rejected token exchange fails only the refresh phase
#[tokio::test]
async fn test_rejected_token_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    mount_empty_search(&server, "contacts").await;
    mount_empty_search(&server, "companies").await;
    mount_empty_search(&server, "meetings").await;

    let db = create_test_database().await;
    db.save_tenant(&seeded_tenant()).await.unwrap();
    let api = Arc::new(HttpCrmClient::new(&config_for(&server).crm).unwrap());
    let sink: Arc<dyn EventSink> = db.clone();

    let summary = SyncOrchestrator::new(&config_for(&server), api, db.clone(), sink)
        .run()
        .await
        .unwrap();

    let account = &summary.accounts[0];
    assert!(!account.phase(SyncPhase::Refreshing).unwrap().succeeded());
    assert!(account.phase(SyncPhase::FetchingContacts).unwrap().succeeded());
    assert_eq!(db.count_actions().await.unwrap(), 0);
}
