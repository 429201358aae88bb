//! Recorded stage results and the definitions they are validated against.
//!
//! A `StageSubmission` is built exactly once per (applicant, stage) by the intake functions in
//! [`intake`] and never mutated afterwards. Each variant mirrors the owning stage's type.

pub mod catalog;
pub mod intake;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{FieldId, StageType, UserId};

pub use catalog::{
    ComponentKind, FormComponent, FormDefinition, Question, QuestionKind, TestDefinition,
};
pub use intake::SubmissionPayload;

/// Result recorded for one stage; exactly one variant matching the stage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageSubmission {
    FormSubmission(FormSubmission),
    TestSubmission(TestSubmission),
    InterviewSubmission(InterviewSubmission),
}

impl StageSubmission {
    pub const fn stage_type(&self) -> StageType {
        match self {
            StageSubmission::FormSubmission(_) => StageType::Form,
            StageSubmission::TestSubmission(_) => StageType::Test,
            StageSubmission::InterviewSubmission(_) => StageType::Interview,
        }
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        match self {
            StageSubmission::FormSubmission(form) => form.submitted_at,
            StageSubmission::TestSubmission(test) => test.submitted_at,
            StageSubmission::InterviewSubmission(interview) => interview.submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub components: BTreeMap<FieldId, ComponentSubmission>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSubmission {
    pub answers: BTreeMap<FieldId, QuestionSubmission>,
    /// Points earned across all questions.
    pub grade: f64,
    pub total_points: f64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl TestSubmission {
    /// Score as a percentage of the available points; `None` when the test is worth nothing.
    pub fn percentage(&self) -> Option<f64> {
        if self.total_points > 0.0 {
            Some(self.grade / self.total_points * 100.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSubmission {
    pub notes: String,
    pub grade: f64,
    pub interviewer: UserId,
    pub submitted_at: DateTime<Utc>,
}

/// Answer to a single form component, typed by the component's declared kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ComponentSubmission {
    ShortText(String),
    LongText(String),
    Address(String),
    Phone(String),
    SingleChoice(String),
    Dropdown(String),
    MultipleChoice(Vec<String>),
    Number(f64),
    Date(DateTime<Utc>),
    FullName(FullName),
    File(FileReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullName {
    pub name: String,
    pub surname: String,
}

/// Pointer into external file storage; the bytes never pass through this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub storage_key: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSubmission {
    pub answer: QuestionAnswer,
    pub grade: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QuestionAnswer {
    Choice(String),
    Choices(Vec<String>),
    Text(String),
}
