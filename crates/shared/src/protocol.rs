use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{BreakdownId, CaseId, ProjectId, RequirementId, ReviewStatus};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Backend timestamps come straight from SQLite `CURRENT_TIMESTAMP`, which uses a space
/// separator. Anything unparseable is dropped rather than failing the whole row.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub project_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

/// A functional point extracted from a raw requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub feature_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub case_count: u32,
}

/// An AI-produced breakdown item awaiting human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub id: BreakdownId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub feature_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Option<String>,
    #[serde(default)]
    pub requirement_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub review_status: Option<ReviewStatus>,
    #[serde(default)]
    pub review_comments: Option<String>,
    #[serde(default)]
    pub source_content: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

fn default_case_priority() -> Option<String> {
    Some("P1".to_string())
}

fn default_case_type() -> Option<String> {
    Some("Functional".to_string())
}

fn default_case_status() -> Option<String> {
    Some("Active".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: CaseId,
    pub requirement_id: RequirementId,
    #[serde(default)]
    pub case_title: String,
    #[serde(default)]
    pub pre_condition: Option<String>,
    #[serde(default)]
    pub steps: Vec<Map<String, Value>>,
    #[serde(default)]
    pub expected_result: Option<String>,
    #[serde(default = "default_case_priority")]
    pub priority: Option<String>,
    #[serde(default = "default_case_type")]
    pub case_type: Option<String>,
    #[serde(default)]
    pub test_data: Option<Map<String, Value>>,
    #[serde(default = "default_case_status")]
    pub status: Option<String>,
}

/// Editable fields of a breakdown item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownUpdate {
    pub module_name: String,
    pub feature_name: String,
    pub description: String,
    pub acceptance_criteria: String,
    pub priority: String,
    #[serde(default)]
    pub source_content: String,
}

impl From<&BreakdownItem> for BreakdownUpdate {
    fn from(item: &BreakdownItem) -> Self {
        Self {
            module_name: item.module_name.clone().unwrap_or_default(),
            feature_name: item.feature_name.clone().unwrap_or_default(),
            description: item.description.clone().unwrap_or_default(),
            acceptance_criteria: item.acceptance_criteria.clone().unwrap_or_default(),
            priority: item.priority.clone().unwrap_or_default(),
            source_content: item.source_content.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatusRequest {
    pub ids: Vec<i64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Acknowledgement returned by the mutating endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Paging metadata wrapper. Every field is optional on the wire; absent `items` reads as an
/// empty page and absent `total` as zero.
///
/// Missing `Option` fields already decode as `None`; a field-level `default` here would make
/// the derived `Deserialize` require `T: Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
    pub items: Option<Vec<T>>,
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// Shape of a list endpoint response: either a bare array or a paging envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Items(Vec<T>),
    Page(PageEnvelope<T>),
}

impl<T> ListPayload<T> {
    pub fn page(items: Vec<T>, total: u64) -> Self {
        ListPayload::Page(PageEnvelope {
            items: Some(items),
            total: Some(total),
            page: None,
            size: None,
        })
    }

    /// Normalizes either shape into `(rows, total)`.
    pub fn into_parts(self) -> (Vec<T>, u64) {
        match self {
            ListPayload::Items(items) => {
                let total = items.len() as u64;
                (items, total)
            }
            ListPayload::Page(envelope) => (
                envelope.items.unwrap_or_default(),
                envelope.total.unwrap_or_default(),
            ),
        }
    }
}
