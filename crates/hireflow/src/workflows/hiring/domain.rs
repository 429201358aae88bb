use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::submission::StageSubmission;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for hiring flows.
    FlowId,
    "flow"
);
string_id!(
    /// Identifier wrapper for stages embedded in a flow.
    StageId,
    "stage"
);
string_id!(
    /// Identifier wrapper for applicant progress records.
    ApplicantId,
    "applicant"
);
string_id!(
    /// Form component or test question identifier.
    FieldId,
    "field"
);
string_id!(
    /// Identifier of the form, test, or interview plan a stage points at.
    ReferenceId,
    "ref"
);
string_id!(
    /// User identifier owned by the user-directory service.
    UserId,
    "user"
);

/// Kind of work an applicant performs at a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    Form,
    Test,
    Interview,
}

impl StageType {
    pub const fn label(self) -> &'static str {
        match self {
            StageType::Form => "form",
            StageType::Test => "test",
            StageType::Interview => "interview",
        }
    }
}

/// One step of a flow. `stage_type` and `reference_id` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub reference_id: ReferenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Minutes allowed to complete a test once started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_duration: Option<u32>,
}

impl Stage {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| now >= start)
            && self.end_date.map_or(true, |end| now <= end)
    }
}

/// Comparison operator carried by a condition edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Includes,
}

impl Operation {
    pub const fn is_relational(self) -> bool {
        matches!(
            self,
            Operation::Gt | Operation::Lt | Operation::Gte | Operation::Lte
        )
    }
}

/// Right-hand operand of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ComparableValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    FullName { name: String, surname: String },
    Selections(Vec<String>),
}

/// Edge gating the move from `from` to the stage immediately after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub from: StageId,
    pub to: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldId>,
    pub operation: Operation,
    pub value: ComparableValue,
}

/// A hiring pipeline owning its stages and conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    pub company: String,
    pub stages: Vec<Stage>,
    pub conditions: Vec<Condition>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Flow {
    pub fn new(name: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            id: FlowId::generate(),
            name: name.into(),
            company: company.into(),
            stages: Vec::new(),
            conditions: Vec::new(),
            active: false,
            start_date: None,
            end_date: None,
        }
    }

    pub fn accepts_applicants_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.start_date.map_or(true, |start| now >= start)
            && self.end_date.map_or(true, |end| now <= end)
    }
}

/// A candidate's progress record through one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub flow_id: FlowId,
    pub email: String,
    pub name: String,
    pub stage_index: usize,
    pub stage_completed: bool,
    pub stage_submissions: BTreeMap<StageId, StageSubmission>,
    /// Bumped on every persisted change; storage rejects writes against a stale version.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Applicant {
    pub fn new(
        flow_id: FlowId,
        email: &str,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicantId::generate(),
            flow_id,
            email: normalize_email(email),
            name: name.into(),
            stage_index: 0,
            stage_completed: false,
            stage_submissions: BTreeMap::new(),
            version: 0,
            created_at,
        }
    }

    pub fn has_submitted(&self, stage_id: &StageId) -> bool {
        self.stage_submissions.contains_key(stage_id)
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
