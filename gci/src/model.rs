//! Typed records exchanged with the GCI program API.
//!
//! Every record keeps the fields this crate does not interpret in an `extra`
//! map, so archived JSON stays faithful to what the server returned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use tracing::warn;

/// A task definition as known to the program API.
///
/// Every field but `name` may be absent or `null` in what the service
/// returns, and is written back out only when it was present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    /// Absent on local tasks that were never submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_beginner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_complete_in_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A task definition exactly as read from a local task file.
///
/// Submission posts this map as is, so keys the tool does not know about and
/// explicit `null` values reach the service untouched.
pub type RawTask = Map<String, Value>;

/// Task categories, numbered from 1 by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Coding,
    UserInterface,
    DocumentationAndTraining,
    QualityAssurance,
    OutreachAndResearch,
}

impl Category {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Coding),
            2 => Some(Self::UserInterface),
            3 => Some(Self::DocumentationAndTraining),
            4 => Some(Self::QualityAssurance),
            5 => Some(Self::OutreachAndResearch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Coding => "Coding",
            Self::UserInterface => "User Interface",
            Self::DocumentationAndTraining => "Documentation & Training",
            Self::QualityAssurance => "Quality Assurance",
            Self::OutreachAndResearch => "Outreach & Research",
        }
    }

    /// Human-readable name for a raw code, tolerating codes the API may add later.
    pub fn describe(code: u8) -> String {
        match Self::from_code(code) {
            Some(category) => category.name().to_string(),
            None => format!("Unknown ({code})"),
        }
    }
}

/// Lifecycle state of a task instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    #[default]
    Open,
    Claimed,
    NeedsWork,
    NeedsReview,
    Completed,
    Abandoned,
    UnassignedByTimeout,
    Other(String),
}

impl InstanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "OPEN",
            Self::Claimed => "CLAIMED",
            Self::NeedsWork => "NEEDS_WORK",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
            Self::UnassignedByTimeout => "UNASSIGNED_BY_TIMEOUT",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OPEN" => Self::Open,
            "CLAIMED" => Self::Claimed,
            "NEEDS_WORK" => Self::NeedsWork,
            "NEEDS_REVIEW" => Self::NeedsReview,
            "COMPLETED" => Self::Completed,
            "ABANDONED" => Self::Abandoned,
            "UNASSIGNED_BY_TIMEOUT" => Self::UnassignedByTimeout,
            _ => Self::Other(value),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One assignment of a task to a student.
///
/// The block of optional fields after `modified` is not part of the instance
/// listing; it is copied from the parent [`Task`] by [`TaskInstance::enrich`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: u64,
    pub task_definition_id: u64,
    pub task_definition_name: String,
    pub organization_id: u64,
    pub organization_name: String,
    #[serde(default)]
    pub student_id: Option<u64>,
    #[serde(default)]
    pub student_display_name: Option<String>,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub completion_date: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_beginner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_complete_in_days: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskInstance {
    /// Copies the descriptive fields of the parent task definition onto this instance.
    pub fn enrich(&mut self, task: &Task) {
        self.description = task.description.clone();
        self.max_instances = task.max_instances;
        self.tags = task.tags.clone();
        self.mentors = task.mentors.clone();
        self.is_beginner = task.is_beginner;
        self.categories = task.categories.clone();
        self.time_to_complete_in_days = task.time_to_complete_in_days;
    }
}

/// A file attached to an activity entry. `url` is relative to the service root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

/// A discussion or status-change event on an instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The activity feed of one instance, both as received and as parsed entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub raw: Value,
    pub entries: Vec<ActivityEntry>,
}

impl Activity {
    /// Interprets an activity response.
    ///
    /// A well-formed response wraps the entries in `results`. Anything else is
    /// kept verbatim in `raw` with no entries so it can still be archived.
    pub fn from_response(response: Value) -> Self {
        let Some(results) = response.get("results").cloned() else {
            warn!("unknown instance activity result, keeping raw response");
            return Self {
                raw: response,
                entries: Vec::new(),
            };
        };
        let entries = match serde_json::from_value::<Vec<ActivityEntry>>(results.clone()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("cannot parse instance activity entries: {err}");
                Vec::new()
            }
        };
        Self {
            raw: results,
            entries,
        }
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.entries.iter().flat_map(|entry| entry.attachments.iter())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}
