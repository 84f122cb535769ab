//! Incremental synchronization engine
//!
//! This module pulls changed CRM records since per-entity watermarks and turns
//! them into sync events for the analytics sink.
//!
//! # Components
//!
//! - [`credentials`]: Access token refresh on expiry
//! - [`retry`]: Retry manager with exponential backoff and a recovery hook
//! - [`fetcher`]: Time-windowed, cursor-based pagination per entity type
//! - [`resolver`]: Association lookups (contact companies, meeting attendees)
//! - [`classifier`]: Created/updated classification and property projection
//! - [`queue`]: Ordered event buffer with threshold-triggered flushes
//! - [`orchestrator`]: Per-account state machine tying the above together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use crm_sync::config::Config;
//! use crm_sync::crm::HttpCrmClient;
//! use crm_sync::database::SqliteDatabase;
//! use crm_sync::sync::SyncOrchestrator;
//!
//! let config = Config::default();
//! let api = Arc::new(HttpCrmClient::new(&config.crm)?);
//! let db = Arc::new(SqliteDatabase::new(&config.database.path).await?);
//!
//! let orchestrator = SyncOrchestrator::new(&config, api, db.clone(), db);
//! let summary = orchestrator.run().await?;
//! ```

pub mod classifier;
pub mod credentials;
pub mod fetcher;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod retry;

// Re-export main types for convenience
pub use classifier::{filter_placeholder_values, EventClassifier, RecordAssociations};
pub use credentials::{AccountSession, CredentialManager};
pub use fetcher::{EntityPager, PageCursor, PaginatedFetcher};
pub use orchestrator::{AccountSummary, PhaseReport, RunSummary, SyncOrchestrator, SyncPhase};
pub use queue::BatchingQueue;
pub use resolver::AssociationResolver;
pub use retry::{RetryManager, RetryRecovery};
