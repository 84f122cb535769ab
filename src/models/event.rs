//! Sync event models
//!
//! A sync event is the normalized, timestamped document written to the
//! analytics sink. Events are immutable once constructed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityType;

/// Filtered contact property object
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// Whether a record was created or updated since the watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Created,
    Updated,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Created => f.write_str("Created"),
            ActionKind::Updated => f.write_str("Updated"),
        }
    }
}

/// Company projection carried by company events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyEventProperties {
    pub company_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_industry: Option<String>,
}

/// Meeting projection carried by meeting events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingEventProperties {
    pub meeting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub createdate: Option<String>,
}

/// Entity-specific property sub-object
///
/// Serialized under the key the analytics sink expects for each entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventProperties {
    #[serde(rename = "companyProperties")]
    Company(CompanyEventProperties),
    #[serde(rename = "userProperties")]
    Contact(PropertyMap),
    #[serde(rename = "meetingProperties")]
    Meeting(MeetingEventProperties),
}

impl EventProperties {
    /// Entity type the properties describe
    pub fn entity(&self) -> EntityType {
        match self {
            EventProperties::Company(_) => EntityType::Company,
            EventProperties::Contact(_) => EntityType::Contact,
            EventProperties::Meeting(_) => EntityType::Meeting,
        }
    }
}

/// Normalized event queued for the analytics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// Classification name, e.g. "Contact Created"
    pub action_name: String,

    /// Instant derived from the record's creation or modification time
    pub action_date: DateTime<Utc>,

    /// Identity the event is attributed to (contact email)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Always 0: sync-sourced events are excluded from live aggregation
    pub include_in_analytics: u8,

    /// Entity-specific properties
    #[serde(flatten)]
    pub properties: EventProperties,
}

impl SyncEvent {
    /// Create a new event for the given classification
    pub fn new(kind: ActionKind, action_date: DateTime<Utc>, properties: EventProperties) -> Self {
        Self {
            action_name: format!("{} {}", properties.entity().label(), kind),
            action_date,
            identity: None,
            include_in_analytics: 0,
            properties,
        }
    }

    /// Attribute the event to an identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Check if the event is excluded from analytics aggregation
    pub fn is_excluded_from_analytics(&self) -> bool {
        self.include_in_analytics == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_action_name_combines_entity_and_kind() {
        let event = SyncEvent::new(
            ActionKind::Created,
            Utc::now(),
            EventProperties::Company(CompanyEventProperties::default()),
        );
        assert_eq!(event.action_name, "Company Created");
        assert!(event.is_excluded_from_analytics());
        assert_eq!(event.identity, None);
    }

    #[test]
    fn test_contact_event_document_shape() {
        let mut props = PropertyMap::new();
        props.insert("contact_name".to_string(), json!("Ada Lovelace"));
        props.insert("contact_score".to_string(), json!(0));

        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let event = SyncEvent::new(ActionKind::Updated, date, EventProperties::Contact(props))
            .with_identity("ada@example.com");

        let doc = serde_json::to_value(&event).unwrap();
        assert_eq!(
            doc,
            json!({
                "actionName": "Contact Updated",
                "actionDate": "2024-03-01T12:00:00Z",
                "identity": "ada@example.com",
                "includeInAnalytics": 0,
                "userProperties": {
                    "contact_name": "Ada Lovelace",
                    "contact_score": 0
                }
            })
        );
    }

    #[test]
    fn test_company_event_omits_missing_fields() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let event = SyncEvent::new(
            ActionKind::Created,
            date,
            EventProperties::Company(CompanyEventProperties {
                company_id: "99".to_string(),
                company_domain: Some("example.com".to_string()),
                company_industry: None,
            }),
        );

        let doc = serde_json::to_value(&event).unwrap();
        assert_eq!(
            doc["companyProperties"],
            json!({ "company_id": "99", "company_domain": "example.com" })
        );
        assert!(doc.get("identity").is_none());
    }

    #[test]
    fn test_event_document_deserializes() {
        let doc = json!({
            "actionName": "Meeting Created",
            "actionDate": "2024-03-01T12:00:00Z",
            "identity": "a@example.com",
            "includeInAnalytics": 0,
            "meetingProperties": { "meeting_id": "5", "title": "Kickoff" }
        });

        let event: SyncEvent = serde_json::from_value(doc).unwrap();
        assert_eq!(event.properties.entity(), EntityType::Meeting);
        assert_eq!(event.identity.as_deref(), Some("a@example.com"));
    }
}
