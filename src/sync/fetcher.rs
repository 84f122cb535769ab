//! Paginated "search since watermark" loop for one entity type
//!
//! Each pass snapshots `now` once and fetches records modified inside
//! `[watermark, loop_start)`, ascending by modification time. When the
//! continuation offset reaches the search API's depth limit the pager drops
//! the offset and moves the window's lower bound to the last record seen.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::credentials::AccountSession;
use super::retry::RetryManager;
use crate::config::{RetryConfig, SyncConfig};
use crate::crm::{
    CrmApi, CrmObject, Filter, FilterGroup, FilterOperator, SearchPage, SearchRequest, Sort,
    SortDirection,
};
use crate::error::FetchError;
use crate::models::{Account, EntityType, RawRecord, RecordProperties};

/// Continuation state of one pagination loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Opaque continuation token of the next page
    pub after: Option<String>,
    /// Lower bound replacing the watermark after a re-window
    pub window_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagerState {
    Active,
    Completed,
    Failed,
}

/// Creates pagers sharing one CRM client and retry policy
pub struct PaginatedFetcher {
    api: Arc<dyn CrmApi>,
    retry: RetryManager,
    page_size: u32,
    max_offset: u64,
}

impl PaginatedFetcher {
    pub fn new(api: Arc<dyn CrmApi>, sync: &SyncConfig, retry: RetryConfig) -> Self {
        Self {
            api,
            retry: RetryManager::new(retry),
            page_size: sync.page_size,
            max_offset: sync.max_offset,
        }
    }

    /// Start a pass over records modified since `watermark`
    pub fn fetch(&self, entity: EntityType, watermark: Option<DateTime<Utc>>) -> EntityPager<'_> {
        self.fetch_until(entity, watermark, Utc::now())
    }

    /// Start a pass with an explicit loop-start snapshot
    pub fn fetch_until(
        &self,
        entity: EntityType,
        watermark: Option<DateTime<Utc>>,
        loop_start: DateTime<Utc>,
    ) -> EntityPager<'_> {
        EntityPager {
            fetcher: self,
            entity,
            watermark,
            loop_start,
            cursor: PageCursor::default(),
            state: PagerState::Active,
            pages: 0,
        }
    }
}

/// Lazy, finite, non-restartable sequence of record pages
pub struct EntityPager<'f> {
    fetcher: &'f PaginatedFetcher,
    entity: EntityType,
    watermark: Option<DateTime<Utc>>,
    loop_start: DateTime<Utc>,
    cursor: PageCursor,
    state: PagerState,
    pages: u32,
}

impl EntityPager<'_> {
    /// Instant the pass treats as "now"
    pub fn loop_start(&self) -> DateTime<Utc> {
        self.loop_start
    }

    /// Cursor the next request will use
    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// True once the last page has been returned
    pub fn is_complete(&self) -> bool {
        self.state == PagerState::Completed
    }

    /// Search body for the next page
    pub fn next_request(&self) -> SearchRequest {
        let property = self.entity.last_modified_property();

        let mut filters = Vec::with_capacity(2);
        if let Some(lower) = self.cursor.window_start.or(self.watermark) {
            filters.push(Filter::date(property, FilterOperator::Gte, lower));
        }
        filters.push(Filter::date(property, FilterOperator::Lt, self.loop_start));

        SearchRequest {
            filter_groups: vec![FilterGroup { filters }],
            sorts: vec![Sort {
                property_name: property.to_string(),
                direction: SortDirection::Ascending,
            }],
            properties: self
                .entity
                .search_properties()
                .iter()
                .map(|p| p.to_string())
                .collect(),
            limit: self.fetcher.page_size,
            after: self.cursor.after.clone(),
        }
    }

    /// Fetch the next page
    ///
    /// Returns `Ok(None)` once pagination has ended. Records without a
    /// property bag are skipped. An exhausted page fails the pass and every
    /// later call returns `Ok(None)`.
    pub async fn next_page(
        &mut self,
        session: &mut AccountSession<'_>,
    ) -> Result<Option<Vec<RawRecord>>, FetchError> {
        if self.state != PagerState::Active {
            return Ok(None);
        }

        let request = self.next_request();
        let api = self.fetcher.api.as_ref();
        let entity = self.entity;

        let result = self
            .fetcher
            .retry
            .execute(session, |s| {
                let token = s.access_token().to_string();
                let request = &request;
                async move { api.search(&token, entity, request).await }
            })
            .await;

        let page = match result {
            Ok(page) => page,
            Err(last_error) => {
                self.state = PagerState::Failed;
                return Err(FetchError::Exhausted {
                    entity,
                    attempts: self.fetcher.retry.config().max_attempts.max(1),
                    last_error,
                });
            }
        };

        self.pages += 1;
        let records: Vec<RawRecord> = page
            .results
            .iter()
            .filter_map(|object| to_raw_record(entity, object))
            .collect();

        debug!(
            entity = %entity,
            page = self.pages,
            count = page.results.len(),
            kept = records.len(),
            "Fetched page"
        );

        self.advance(&page);
        Ok(Some(records))
    }

    fn advance(&mut self, page: &SearchPage) {
        let Some(after) = page.next_after() else {
            self.state = PagerState::Completed;
            return;
        };

        let exhausted_offset = after
            .parse::<u64>()
            .map(|offset| offset >= self.fetcher.max_offset)
            .unwrap_or(false);

        if !exhausted_offset {
            self.cursor.after = Some(after.to_string());
            return;
        }

        match page.results.iter().rev().find_map(|object| object.updated_at) {
            Some(last_modified) => {
                info!(
                    entity = %self.entity,
                    window_start = %last_modified,
                    "Paging offset limit reached, re-windowing on modification time"
                );
                self.cursor.after = None;
                self.cursor.window_start = Some(last_modified);
            }
            None => self.state = PagerState::Completed,
        }
    }

    /// Move the account's watermark to the loop start if the pass completed
    ///
    /// Returns whether the watermark moved.
    pub fn advance_watermark(&self, account: &mut Account) -> bool {
        if !self.is_complete() {
            return false;
        }
        account.set_watermark(self.entity, self.loop_start);
        true
    }
}

fn to_raw_record(entity: EntityType, object: &CrmObject) -> Option<RawRecord> {
    let properties = object.properties.clone()?;
    let (Some(created_at), Some(updated_at)) = (object.created_at, object.updated_at) else {
        debug!(entity = %entity, id = %object.id, "Skipping record without timestamps");
        return None;
    };
    let Some(properties) = RecordProperties::from_json(entity, properties) else {
        debug!(entity = %entity, id = %object.id, "Skipping record with malformed properties");
        return None;
    };
    Some(RawRecord::new(object.id.clone(), created_at, updated_at, properties))
}
