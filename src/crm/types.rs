//! Wire types for the CRM v3 REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison operator of a search filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    Gte,
    Lt,
}

/// Single property filter; values are epoch milliseconds as strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Filter {
    /// Filter comparing a date property against an instant
    pub fn date(property: &str, operator: FilterOperator, at: DateTime<Utc>) -> Self {
        Self {
            property_name: property.to_string(),
            operator,
            value: at.timestamp_millis().to_string(),
        }
    }
}

/// Filters combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Ascending,
}

/// Sort clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub property_name: String,
    pub direction: SortDirection,
}

/// Body of a search call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub sorts: Vec<Sort>,
    pub properties: Vec<String>,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Object as returned by search and batch-read calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmObject {
    pub id: String,
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CrmObject {
    /// String value of a property, if present and a string
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.get(name))
            .and_then(|value| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextPage {
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<CrmObject>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl SearchPage {
    /// Continuation token reported for the next page
    pub fn next_after(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .and_then(|n| n.after.as_deref())
            .filter(|after| !after.is_empty())
    }
}

/// Object reference in batch inputs and association rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectId {
    pub id: String,
}

/// One row of an association batch-read
///
/// `from` is absent for inputs the CRM could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRow {
    #[serde(default)]
    pub from: Option<ObjectId>,
    #[serde(default)]
    pub to: Vec<ObjectId>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchInputs<'a> {
    pub inputs: Vec<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<&'a [String]>,
}

impl<'a> BatchInputs<'a> {
    pub(crate) fn new(ids: &[String], properties: Option<&'a [String]>) -> Self {
        Self {
            inputs: ids.iter().map(|id| ObjectId { id: id.clone() }).collect(),
            properties,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Result of a refresh-token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
}
