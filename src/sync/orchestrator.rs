//! Per-account sync state machine
//!
//! Accounts are processed one at a time. Each account walks
//! `Refreshing -> FetchingContacts -> FetchingCompanies -> FetchingMeetings
//! -> Draining -> Done`; a failing phase is logged and the machine moves on.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::classifier::{EventClassifier, RecordAssociations};
use super::credentials::{AccountSession, CredentialManager};
use super::fetcher::PaginatedFetcher;
use super::queue::BatchingQueue;
use super::resolver::AssociationResolver;
use crate::config::Config;
use crate::crm::CrmApi;
use crate::database::{EventSink, TenantStore};
use crate::error::{AppError, FetchError};
use crate::models::{Account, EntityType};

/// Phase of one account's run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Refreshing,
    FetchingContacts,
    FetchingCompanies,
    FetchingMeetings,
    Draining,
    Done,
}

impl SyncPhase {
    /// Phase that follows, regardless of this phase's outcome
    pub fn next(self) -> Self {
        match self {
            SyncPhase::Refreshing => SyncPhase::FetchingContacts,
            SyncPhase::FetchingContacts => SyncPhase::FetchingCompanies,
            SyncPhase::FetchingCompanies => SyncPhase::FetchingMeetings,
            SyncPhase::FetchingMeetings => SyncPhase::Draining,
            SyncPhase::Draining | SyncPhase::Done => SyncPhase::Done,
        }
    }

    /// Operation name used in logs
    pub fn operation(self) -> &'static str {
        match self {
            SyncPhase::Refreshing => "refresh_access_token",
            SyncPhase::FetchingContacts => "process_contacts",
            SyncPhase::FetchingCompanies => "process_companies",
            SyncPhase::FetchingMeetings => "process_meetings",
            SyncPhase::Draining => "drain_queue",
            SyncPhase::Done => "save_tenant",
        }
    }

    fn entity(self) -> Option<EntityType> {
        match self {
            SyncPhase::FetchingContacts => Some(EntityType::Contact),
            SyncPhase::FetchingCompanies => Some(EntityType::Company),
            SyncPhase::FetchingMeetings => Some(EntityType::Meeting),
            _ => None,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: SyncPhase,
    /// Events queued (fetch phases) or flushed (drain)
    pub events: usize,
    /// Logged error, if the phase failed
    pub error: Option<String>,
}

impl PhaseReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub hub_id: String,
    pub phases: Vec<PhaseReport>,
}

impl AccountSummary {
    /// Report for a phase, if it ran
    pub fn phase(&self, phase: SyncPhase) -> Option<&PhaseReport> {
        self.phases.iter().find(|report| report.phase == phase)
    }

    /// Events queued across the fetch phases
    pub fn events_queued(&self) -> usize {
        self.phases
            .iter()
            .filter(|report| report.phase.entity().is_some())
            .map(|report| report.events)
            .sum()
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tenant_id: String,
    pub accounts: Vec<AccountSummary>,
}

impl RunSummary {
    pub fn events_queued(&self) -> usize {
        self.accounts.iter().map(AccountSummary::events_queued).sum()
    }

    pub fn failed_phases(&self) -> usize {
        self.accounts
            .iter()
            .flat_map(|account| account.phases.iter())
            .filter(|report| !report.succeeded())
            .count()
    }
}

/// Drives the sync of every account of the stored tenant
pub struct SyncOrchestrator {
    store: Arc<dyn TenantStore>,
    sink: Arc<dyn EventSink>,
    credentials: CredentialManager,
    fetcher: PaginatedFetcher,
    resolver: AssociationResolver,
    classifier: EventClassifier,
    flush_threshold: usize,
}

impl SyncOrchestrator {
    pub fn new(
        config: &Config,
        api: Arc<dyn CrmApi>,
        store: Arc<dyn TenantStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            sink,
            credentials: CredentialManager::new(Arc::clone(&api), &config.crm),
            fetcher: PaginatedFetcher::new(Arc::clone(&api), &config.sync, config.retry.clone()),
            resolver: AssociationResolver::new(api),
            classifier: EventClassifier::new(&config.sync),
            flush_threshold: config.batch.flush_threshold,
        }
    }

    /// Sync every account of the tenant
    ///
    /// Only a failure to load the tenant is returned; everything after that
    /// is logged and reflected in the summary.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        info!("Start pulling data from CRM");
        let mut tenant = self.store.load_tenant().await?;
        let mut summary = RunSummary {
            tenant_id: tenant.id.clone(),
            accounts: Vec::with_capacity(tenant.accounts.len()),
        };

        for index in 0..tenant.accounts.len() {
            info!(
                api_key = %tenant.api_key,
                hub_id = %tenant.accounts[index].hub_id,
                "Start processing account"
            );

            let mut phases = self
                .process_account(&tenant.api_key, &mut tenant.accounts[index])
                .await;

            let saved = self.store.save_tenant(&tenant).await;
            let hub_id = tenant.accounts[index].hub_id.clone();
            if let Err(err) = &saved {
                error!(
                    api_key = %tenant.api_key,
                    hub_id = %hub_id,
                    operation = SyncPhase::Done.operation(),
                    error = %err,
                    "Failed to save tenant"
                );
            }
            phases.push(PhaseReport {
                phase: SyncPhase::Done,
                events: 0,
                error: saved.err().map(|err| err.to_string()),
            });

            info!(api_key = %tenant.api_key, hub_id = %hub_id, "Finish processing account");
            summary.accounts.push(AccountSummary { hub_id, phases });
        }

        info!(
            tenant_id = %summary.tenant_id,
            accounts = summary.accounts.len(),
            events = summary.events_queued(),
            failed_phases = summary.failed_phases(),
            "Sync run finished"
        );
        Ok(summary)
    }

    /// Run every phase before `Done` for one account
    async fn process_account(&self, api_key: &str, account: &mut Account) -> Vec<PhaseReport> {
        let mut queue = BatchingQueue::new(Arc::clone(&self.sink), api_key, self.flush_threshold);
        let mut reports = Vec::new();
        let mut phase = SyncPhase::Refreshing;

        while phase != SyncPhase::Done {
            let result: Result<usize, AppError> = match phase {
                SyncPhase::Refreshing => self
                    .credentials
                    .ensure_valid_token(account)
                    .await
                    .map(|_| 0)
                    .map_err(AppError::from),
                SyncPhase::FetchingContacts
                | SyncPhase::FetchingCompanies
                | SyncPhase::FetchingMeetings => match phase.entity() {
                    Some(entity) => self
                        .sync_entity(account, entity, &mut queue)
                        .await
                        .map_err(AppError::from),
                    None => Ok(0),
                },
                SyncPhase::Draining => Ok(queue.drain().await),
                SyncPhase::Done => Ok(0),
            };

            let report = match result {
                Ok(events) => {
                    info!(
                        api_key = api_key,
                        hub_id = %account.hub_id,
                        operation = phase.operation(),
                        events = events,
                        "Phase finished"
                    );
                    PhaseReport {
                        phase,
                        events,
                        error: None,
                    }
                }
                Err(err) => {
                    error!(
                        api_key = api_key,
                        hub_id = %account.hub_id,
                        operation = phase.operation(),
                        error = %err,
                        "Phase failed"
                    );
                    PhaseReport {
                        phase,
                        events: 0,
                        error: Some(err.to_string()),
                    }
                }
            };
            reports.push(report);
            phase = phase.next();
        }

        reports
    }

    /// Fetch, classify and enqueue one entity type
    ///
    /// The watermark advances only if pagination completes.
    async fn sync_entity(
        &self,
        account: &mut Account,
        entity: EntityType,
        queue: &mut BatchingQueue,
    ) -> Result<usize, FetchError> {
        let watermark = account.watermark(entity);
        let mut pager = self.fetcher.fetch(entity, watermark);
        let mut session = AccountSession::new(&self.credentials, account);
        let mut events = 0;

        while let Some(records) = pager.next_page(&mut session).await? {
            let token = session.access_token().to_string();

            let companies = if entity == EntityType::Contact {
                let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
                self.resolver
                    .resolve_associations(&token, &ids, EntityType::Contact, EntityType::Company)
                    .await
            } else {
                Default::default()
            };

            for record in &records {
                let mut associations = RecordAssociations {
                    company_id: companies.get(&record.id).cloned(),
                    ..RecordAssociations::default()
                };
                if entity == EntityType::Meeting {
                    associations.attendee_emails =
                        self.resolver.meeting_attendee_emails(&token, &record.id).await;
                    if associations.attendee_emails.is_empty() {
                        warn!(meeting_id = %record.id, "No attendees found for meeting");
                    }
                }

                for event in self.classifier.classify(record, watermark, &associations) {
                    queue.enqueue(event);
                    events += 1;
                }
            }
        }

        if pager.advance_watermark(session.account_mut()) {
            info!(
                hub_id = %session.account().hub_id,
                entity = %entity,
                watermark = %pager.loop_start(),
                "Watermark advanced"
            );
        }
        Ok(events)
    }
}
