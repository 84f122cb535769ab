//! Cross-entity association lookups
//!
//! All lookups fail soft: errors are logged and downgrade to empty results,
//! never retried.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::crm::{AssociationRow, CrmApi};
use crate::error::AssociationError;
use crate::models::EntityType;

/// Properties read for meeting attendees
const ATTENDEE_PROPERTIES: [&str; 3] = ["email", "firstname", "lastname"];

/// Resolves related object IDs and attendee emails via batch reads
pub struct AssociationResolver {
    api: Arc<dyn CrmApi>,
}

impl AssociationResolver {
    pub fn new(api: Arc<dyn CrmApi>) -> Self {
        Self { api }
    }

    /// Map each source ID to its first associated target ID
    ///
    /// Sources without targets are absent from the result. When a source
    /// has several targets the first one returned wins.
    pub async fn resolve_associations(
        &self,
        access_token: &str,
        source_ids: &[String],
        from: EntityType,
        to: EntityType,
    ) -> HashMap<String, String> {
        if source_ids.is_empty() {
            return HashMap::new();
        }

        match self.lookup(access_token, source_ids, from, to).await {
            Ok(rows) => first_targets(rows),
            Err(err) => {
                warn!(error = %err, count = source_ids.len(), "Association lookup failed");
                HashMap::new()
            }
        }
    }

    /// Emails of the contacts attending a meeting
    ///
    /// Two hops: meeting to contact IDs, then a contact batch-read for the
    /// email property. Contacts without an email are left out.
    pub async fn meeting_attendee_emails(
        &self,
        access_token: &str,
        meeting_id: &str,
    ) -> Vec<String> {
        match self.attendee_emails(access_token, meeting_id).await {
            Ok(emails) => emails,
            Err(err) => {
                warn!(meeting_id = meeting_id, error = %err, "Attendee lookup failed");
                Vec::new()
            }
        }
    }

    async fn attendee_emails(
        &self,
        access_token: &str,
        meeting_id: &str,
    ) -> Result<Vec<String>, AssociationError> {
        let rows = self
            .lookup(
                access_token,
                &[meeting_id.to_string()],
                EntityType::Meeting,
                EntityType::Contact,
            )
            .await?;

        let contact_ids: Vec<String> = rows
            .into_iter()
            .filter(|row| row.from.as_ref().map_or(true, |from| from.id == meeting_id))
            .flat_map(|row| row.to.into_iter().map(|to| to.id))
            .collect();

        if contact_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(meeting_id = meeting_id, count = contact_ids.len(), "Found attendees");

        let properties: Vec<String> = ATTENDEE_PROPERTIES.iter().map(|p| p.to_string()).collect();
        let contacts = self
            .api
            .read_objects(access_token, EntityType::Contact, &contact_ids, &properties)
            .await
            .map_err(|source| AssociationError::Objects {
                entity: EntityType::Contact,
                source,
            })?;

        Ok(contacts
            .iter()
            .filter_map(|contact| contact.property("email"))
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn lookup(
        &self,
        access_token: &str,
        source_ids: &[String],
        from: EntityType,
        to: EntityType,
    ) -> Result<Vec<AssociationRow>, AssociationError> {
        self.api
            .read_associations(access_token, from, to, source_ids)
            .await
            .map_err(|source| AssociationError::Lookup { from, to, source })
    }
}

fn first_targets(rows: Vec<AssociationRow>) -> HashMap<String, String> {
    let mut targets = HashMap::new();
    for row in rows {
        let (Some(from), Some(to)) = (row.from, row.to.into_iter().next()) else {
            continue;
        };
        targets.entry(from.id).or_insert(to.id);
    }
    targets
}
