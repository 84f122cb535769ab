//! Raw CRM record models
//!
//! Records are produced by the paginated fetcher and consumed by the
//! classifier. Property bags are typed per entity with explicit optionality
//! for every field the engine requests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Record category synchronized from the CRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Company objects
    Company,
    /// Contact objects
    Contact,
    /// Meeting engagements
    Meeting,
}

impl EntityType {
    /// Object path segment used by the CRM v3 API
    pub fn object_path(&self) -> &'static str {
        match self {
            EntityType::Company => "companies",
            EntityType::Contact => "contacts",
            EntityType::Meeting => "meetings",
        }
    }

    /// Object name used by the associations API (`CONTACTS`, `COMPANIES`, ...)
    pub fn association_name(&self) -> &'static str {
        match self {
            EntityType::Company => "COMPANIES",
            EntityType::Contact => "CONTACTS",
            EntityType::Meeting => "MEETINGS",
        }
    }

    /// Property the search API filters and sorts on
    pub fn last_modified_property(&self) -> &'static str {
        match self {
            EntityType::Contact => "lastmodifieddate",
            EntityType::Company | EntityType::Meeting => "hs_lastmodifieddate",
        }
    }

    /// Properties requested by the search call
    pub fn search_properties(&self) -> &'static [&'static str] {
        match self {
            EntityType::Company => &[
                "name",
                "domain",
                "country",
                "industry",
                "description",
                "annualrevenue",
                "numberofemployees",
                "hs_lead_status",
            ],
            EntityType::Contact => &[
                "firstname",
                "lastname",
                "jobtitle",
                "email",
                "hubspotscore",
                "hs_lead_status",
                "hs_analytics_source",
                "hs_latest_source",
            ],
            EntityType::Meeting => &["hs_meeting_title", "hs_timestamp", "hs_createdate"],
        }
    }

    /// Human-readable label used in event names
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Company => "Company",
            EntityType::Contact => "Contact",
            EntityType::Meeting => "Meeting",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_path())
    }
}

/// Company properties requested from the CRM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProperties {
    #[serde(deserialize_with = "scalar_as_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub domain: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub country: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub industry: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub annualrevenue: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub numberofemployees: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_lead_status: Option<String>,
}

/// Contact properties requested from the CRM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactProperties {
    #[serde(deserialize_with = "scalar_as_string")]
    pub firstname: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub lastname: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub jobtitle: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hubspotscore: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_lead_status: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_analytics_source: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_latest_source: Option<String>,
}

/// Meeting properties requested from the CRM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingProperties {
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_meeting_title: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_timestamp: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub hs_createdate: Option<String>,
}

/// Decode a scalar property value as a string
///
/// Numbers and booleans are stringified; arrays and objects are rejected.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(value)) => Ok(Some(value)),
        Some(serde_json::Value::Number(value)) => Ok(Some(value.to_string())),
        Some(serde_json::Value::Bool(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a scalar property value, got {}",
            other
        ))),
    }
}

/// Typed property bag of a raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordProperties {
    Company(CompanyProperties),
    Contact(ContactProperties),
    Meeting(MeetingProperties),
}

impl RecordProperties {
    /// Decode a CRM property object for the given entity type
    ///
    /// Returns `None` when the object does not match the expected shape.
    pub fn from_json(
        entity: EntityType,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Option<Self> {
        let value = serde_json::Value::Object(properties);
        let decoded = match entity {
            EntityType::Company => serde_json::from_value(value).map(RecordProperties::Company),
            EntityType::Contact => serde_json::from_value(value).map(RecordProperties::Contact),
            EntityType::Meeting => serde_json::from_value(value).map(RecordProperties::Meeting),
        };
        decoded.ok()
    }
}

/// One record returned by a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Entity type of the record
    pub entity: EntityType,
    /// Remote object ID
    pub id: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last-modified instant
    pub updated_at: DateTime<Utc>,
    /// Property bag; `None` for minimal/malformed records
    pub properties: Option<RecordProperties>,
}

impl RawRecord {
    /// Create a record with a property bag
    pub fn new(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        properties: RecordProperties,
    ) -> Self {
        let entity = match properties {
            RecordProperties::Company(_) => EntityType::Company,
            RecordProperties::Contact(_) => EntityType::Contact,
            RecordProperties::Meeting(_) => EntityType::Meeting,
        };
        Self {
            entity,
            id: id.into(),
            created_at,
            updated_at,
            properties: Some(properties),
        }
    }
}
