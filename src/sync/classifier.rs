//! Record to event classification
//!
//! Turns a raw record and its resolved associations into zero or more
//! [`SyncEvent`]s. Event instants always come from the record's own
//! timestamps, never from fetch time.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::config::SyncConfig;
use crate::models::{
    ActionKind, CompanyEventProperties, CompanyProperties, ContactProperties, EntityType,
    EventProperties, MeetingEventProperties, MeetingProperties, PropertyMap, RawRecord,
    RecordProperties, SyncEvent,
};

/// Values treated as "not set" in contact properties (compared lowercase)
pub const PLACEHOLDER_VALUES: [&str; 8] = [
    "[not provided]",
    "placeholder",
    "[[unknown]]",
    "not set",
    "not provided",
    "unknown",
    "undefined",
    "n/a",
];

/// Unresolved merge-field marker left in some CRM values
const MERGE_FIELD_MARKER: &str = "!$record";

/// Associations resolved for a single record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordAssociations {
    /// Company of a contact
    pub company_id: Option<String>,
    /// Emails of a meeting's attendees
    pub attendee_emails: Vec<String>,
}

/// Classifies records as created or updated and projects their properties
#[derive(Debug, Clone)]
pub struct EventClassifier {
    company_created_offset: Duration,
    meeting_default_watermark: DateTime<Utc>,
}

impl EventClassifier {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            company_created_offset: Duration::milliseconds(config.company_created_offset_ms),
            meeting_default_watermark: config.meeting_default_watermark,
        }
    }

    /// Created if the record was created strictly after the watermark
    ///
    /// Without a watermark companies count as created and contacts as
    /// updated; meetings compare against the configured default.
    pub fn action_kind(
        &self,
        entity: EntityType,
        created_at: DateTime<Utc>,
        watermark: Option<DateTime<Utc>>,
    ) -> ActionKind {
        let created = match (entity, watermark) {
            (_, Some(watermark)) => created_at > watermark,
            (EntityType::Company, None) => true,
            (EntityType::Contact, None) => false,
            (EntityType::Meeting, None) => created_at > self.meeting_default_watermark,
        };
        if created {
            ActionKind::Created
        } else {
            ActionKind::Updated
        }
    }

    /// Events for one record
    ///
    /// `watermark` is the entity type's watermark at loop start.
    pub fn classify(
        &self,
        record: &RawRecord,
        watermark: Option<DateTime<Utc>>,
        associations: &RecordAssociations,
    ) -> Vec<SyncEvent> {
        let Some(properties) = &record.properties else {
            return Vec::new();
        };

        let kind = self.action_kind(record.entity, record.created_at, watermark);
        let action_date = match kind {
            ActionKind::Created => record.created_at,
            ActionKind::Updated => record.updated_at,
        };

        match properties {
            RecordProperties::Company(props) => {
                let action_date = match kind {
                    ActionKind::Created => action_date - self.company_created_offset,
                    ActionKind::Updated => action_date,
                };
                vec![company_event(record, props, kind, action_date)]
            }
            RecordProperties::Contact(props) => {
                contact_event(record, props, kind, action_date, associations.company_id.as_deref())
                    .into_iter()
                    .collect()
            }
            RecordProperties::Meeting(props) => {
                let template = EventProperties::Meeting(meeting_properties(record, props));
                associations
                    .attendee_emails
                    .iter()
                    .map(|email| {
                        SyncEvent::new(kind, action_date, template.clone())
                            .with_identity(email.as_str())
                    })
                    .collect()
            }
        }
    }
}

fn company_event(
    record: &RawRecord,
    props: &CompanyProperties,
    kind: ActionKind,
    action_date: DateTime<Utc>,
) -> SyncEvent {
    SyncEvent::new(
        kind,
        action_date,
        EventProperties::Company(CompanyEventProperties {
            company_id: record.id.clone(),
            company_domain: props.domain.clone(),
            company_industry: props.industry.clone(),
        }),
    )
}

fn contact_event(
    record: &RawRecord,
    props: &ContactProperties,
    kind: ActionKind,
    action_date: DateTime<Utc>,
    company_id: Option<&str>,
) -> Option<SyncEvent> {
    let email = props.email.as_deref().filter(|email| !email.is_empty())?;

    let name = format!(
        "{} {}",
        props.firstname.as_deref().unwrap_or_default(),
        props.lastname.as_deref().unwrap_or_default()
    );

    let mut user_properties = PropertyMap::new();
    user_properties.insert("contact_id".to_string(), Value::from(record.id.as_str()));
    user_properties.insert("company_id".to_string(), optional(company_id));
    user_properties.insert("contact_name".to_string(), Value::from(name.trim()));
    user_properties.insert("contact_title".to_string(), optional(props.jobtitle.as_deref()));
    user_properties.insert(
        "contact_source".to_string(),
        optional(props.hs_analytics_source.as_deref()),
    );
    user_properties.insert(
        "contact_status".to_string(),
        optional(props.hs_lead_status.as_deref()),
    );
    user_properties.insert(
        "contact_score".to_string(),
        Value::from(parse_score(props.hubspotscore.as_deref())),
    );

    Some(
        SyncEvent::new(
            kind,
            action_date,
            EventProperties::Contact(filter_placeholder_values(user_properties)),
        )
        .with_identity(email),
    )
}

fn meeting_properties(record: &RawRecord, props: &MeetingProperties) -> MeetingEventProperties {
    MeetingEventProperties {
        meeting_id: record.id.clone(),
        title: props.hs_meeting_title.clone(),
        timestamp: props.hs_timestamp.clone(),
        createdate: props.hs_createdate.clone(),
    }
}

fn optional(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

/// Leading integer of a score, 0 when there is none
fn parse_score(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim) else {
        return 0;
    };
    let digits_end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(raw.len(), |(i, _)| i);
    raw[..digits_end].parse().unwrap_or(0)
}

/// True if a value carries no information
pub fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let lower = s.to_lowercase();
            s.is_empty()
                || PLACEHOLDER_VALUES.contains(&lower.as_str())
                || lower.contains(MERGE_FIELD_MARKER)
        }
        _ => false,
    }
}

/// Drop null, empty and placeholder values from a property object
pub fn filter_placeholder_values(properties: PropertyMap) -> PropertyMap {
    properties
        .into_iter()
        .filter(|(_, value)| !is_placeholder(value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn classifier() -> EventClassifier {
        EventClassifier::new(&SyncConfig::default())
    }

    fn ada(created: DateTime<Utc>, updated: DateTime<Utc>) -> RawRecord {
        RawRecord::new(
            "7",
            created,
            updated,
            RecordProperties::Contact(ContactProperties {
                firstname: Some("Ada".to_string()),
                lastname: Some("Lovelace".to_string()),
                email: Some("ada@example.com".to_string()),
                ..ContactProperties::default()
            }),
        )
    }

    fn company(created: DateTime<Utc>, updated: DateTime<Utc>) -> RawRecord {
        RawRecord::new(
            "99",
            created,
            updated,
            RecordProperties::Company(CompanyProperties {
                domain: Some("example.com".to_string()),
                industry: Some("Software".to_string()),
                ..CompanyProperties::default()
            }),
        )
    }

    fn meeting() -> RawRecord {
        RawRecord::new(
            "m-1",
            at(5),
            at(6),
            RecordProperties::Meeting(MeetingProperties {
                hs_meeting_title: Some("Kickoff".to_string()),
                hs_timestamp: Some("2024-01-05T10:00:00Z".to_string()),
                hs_createdate: None,
            }),
        )
    }

    // Test 1: Created strictly after the watermark, for every entity type
    #[test]
    fn test_created_vs_updated_against_watermark() {
        let c = classifier();
        for entity in [EntityType::Company, EntityType::Contact, EntityType::Meeting] {
            assert_eq!(c.action_kind(entity, at(3), Some(at(2))), ActionKind::Created);
            assert_eq!(c.action_kind(entity, at(2), Some(at(2))), ActionKind::Updated);
            assert_eq!(c.action_kind(entity, at(1), Some(at(2))), ActionKind::Updated);
        }
    }

    // Test 2: Missing watermark rules differ per entity type
    #[test]
    fn test_missing_watermark_rules() {
        let c = classifier();
        assert_eq!(c.action_kind(EntityType::Company, at(1), None), ActionKind::Created);
        assert_eq!(c.action_kind(EntityType::Contact, at(1), None), ActionKind::Updated);
        assert_eq!(c.action_kind(EntityType::Meeting, at(1), None), ActionKind::Created);

        let old = Utc.with_ymd_and_hms(1999, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(c.action_kind(EntityType::Meeting, old, None), ActionKind::Updated);
    }

    // Test 3: Ada Lovelace updated before the watermark
    #[test]
    fn test_contact_updated_event() {
        let events = classifier().classify(
            &ada(at(1), at(4)),
            Some(at(2)),
            &RecordAssociations::default(),
        );

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.action_name, "Contact Updated");
        assert_eq!(event.action_date, at(4));
        assert_eq!(event.identity.as_deref(), Some("ada@example.com"));

        let EventProperties::Contact(props) = &event.properties else {
            panic!("expected contact properties");
        };
        assert_eq!(props.get("contact_name"), Some(&json!("Ada Lovelace")));
        assert!(!props.contains_key("contact_title"));
        assert!(!props.contains_key("company_id"));
        assert_eq!(props.get("contact_score"), Some(&json!(0)));
    }

    // Test 4: Contact without email yields nothing
    #[test]
    fn test_contact_without_email_is_dropped() {
        let mut record = ada(at(3), at(4));
        if let Some(RecordProperties::Contact(props)) = &mut record.properties {
            props.email = None;
        }
        assert!(classifier()
            .classify(&record, Some(at(2)), &RecordAssociations::default())
            .is_empty());
    }

    // Test 5: Contact carries its company and parsed score
    #[test]
    fn test_contact_company_and_score() {
        let mut record = ada(at(3), at(4));
        if let Some(RecordProperties::Contact(props)) = &mut record.properties {
            props.hubspotscore = Some("42".to_string());
            props.jobtitle = Some("N/A".to_string());
            props.hs_lead_status = Some("OPEN".to_string());
        }
        let associations = RecordAssociations {
            company_id: Some("500".to_string()),
            ..RecordAssociations::default()
        };

        let events = classifier().classify(&record, Some(at(2)), &associations);
        assert_eq!(events[0].action_name, "Contact Created");
        assert_eq!(events[0].action_date, at(3));

        let EventProperties::Contact(props) = &events[0].properties else {
            panic!("expected contact properties");
        };
        assert_eq!(props.get("company_id"), Some(&json!("500")));
        assert_eq!(props.get("contact_score"), Some(&json!(42)));
        assert_eq!(props.get("contact_status"), Some(&json!("OPEN")));
        assert!(!props.contains_key("contact_title"));
    }

    // Test 6: Company-created events are shifted back by the configured offset
    #[test]
    fn test_company_created_offset() {
        let none = RecordAssociations::default();
        let events = classifier().classify(&company(at(3), at(4)), Some(at(2)), &none);
        assert_eq!(events[0].action_name, "Company Created");
        assert_eq!(events[0].action_date, at(3) - Duration::seconds(2));
        assert_eq!(events[0].identity, None);

        let updated = classifier().classify(&company(at(1), at(4)), Some(at(2)), &none);
        assert_eq!(updated[0].action_name, "Company Updated");
        assert_eq!(updated[0].action_date, at(4));
    }

    // Test 7: The company offset is configurable
    #[test]
    fn test_company_offset_configurable() {
        let classifier = EventClassifier::new(&SyncConfig {
            company_created_offset_ms: 0,
            ..SyncConfig::default()
        });
        let events =
            classifier.classify(&company(at(3), at(4)), None, &RecordAssociations::default());
        assert_eq!(events[0].action_date, at(3));
    }

    // Test 8: Meeting fans out one event per attendee
    #[test]
    fn test_meeting_fan_out() {
        let associations = RecordAssociations {
            attendee_emails: vec![
                "a@example.com".to_string(),
                "b@example.com".to_string(),
                "c@example.com".to_string(),
            ],
            ..RecordAssociations::default()
        };

        let events = classifier().classify(&meeting(), Some(at(2)), &associations);

        assert_eq!(events.len(), 3);
        let identities: Vec<_> = events.iter().filter_map(|e| e.identity.as_deref()).collect();
        assert_eq!(identities, vec!["a@example.com", "b@example.com", "c@example.com"]);
        assert!(events.iter().all(|e| e.properties == events[0].properties));
        assert!(events.iter().all(|e| e.action_name == "Meeting Created"));
        assert!(events.iter().all(SyncEvent::is_excluded_from_analytics));
    }

    // Test 9: Meeting without attendees yields nothing
    #[test]
    fn test_meeting_without_attendees() {
        assert!(classifier()
            .classify(&meeting(), Some(at(2)), &RecordAssociations::default())
            .is_empty());
    }

    // Test 10: Placeholder filtering drops sentinels case-insensitively
    #[test]
    fn test_filter_placeholder_values() {
        let mut props = PropertyMap::new();
        props.insert("a".to_string(), json!("Unknown"));
        props.insert("b".to_string(), json!(""));
        props.insert("c".to_string(), json!(null));
        props.insert("d".to_string(), json!("[Not Provided]"));
        props.insert("e".to_string(), json!("Hello {{!$record.name}}"));
        props.insert("f".to_string(), json!("Engineer"));
        props.insert("g".to_string(), json!(0));

        let filtered = filter_placeholder_values(props);
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["f", "g"]);
    }

    // Test 11: Filtering is idempotent
    #[test]
    fn test_filter_is_idempotent() {
        let mut props = PropertyMap::new();
        props.insert("a".to_string(), json!("n/a"));
        props.insert("b".to_string(), json!("kept"));
        props.insert("c".to_string(), json!(7));

        let once = filter_placeholder_values(props);
        let twice = filter_placeholder_values(once.clone());
        assert_eq!(once, twice);
    }

    // Test 12: Score parsing takes the leading integer and falls back to zero
    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(Some("17")), 17);
        assert_eq!(parse_score(Some("12.5")), 12);
        assert_eq!(parse_score(Some("-3")), -3);
        assert_eq!(parse_score(Some("abc")), 0);
        assert_eq!(parse_score(Some("")), 0);
        assert_eq!(parse_score(None), 0);
    }
}
