use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::super::domain::{FieldId, Stage, StageType, UserId};
use super::super::errors::ValidationError;
use super::catalog::{ComponentKind, FormDefinition, QuestionKind, TestDefinition};
use super::{
    ComponentSubmission, FileReference, FormSubmission, FullName, InterviewSubmission,
    QuestionAnswer, QuestionSubmission, StageSubmission, TestSubmission,
};

/// Raw answers as sent by clients; shapes are checked against the stage's definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionPayload {
    Form {
        components: BTreeMap<FieldId, Value>,
    },
    Test {
        started_at: DateTime<Utc>,
        answers: BTreeMap<FieldId, Value>,
    },
    Interview {
        notes: String,
        grade: f64,
    },
}

impl SubmissionPayload {
    pub const fn stage_type(&self) -> StageType {
        match self {
            SubmissionPayload::Form { .. } => StageType::Form,
            SubmissionPayload::Test { .. } => StageType::Test,
            SubmissionPayload::Interview { .. } => StageType::Interview,
        }
    }
}

/// Build a form submission, rejecting unknown components and missing required ones.
pub fn form_submission(
    definition: &FormDefinition,
    components: BTreeMap<FieldId, Value>,
    now: DateTime<Utc>,
) -> Result<StageSubmission, ValidationError> {
    if let Some(unknown) = components
        .keys()
        .find(|id| definition.component(id).is_none())
    {
        return Err(ValidationError::UnknownField(unknown.clone()));
    }

    let mut accepted = BTreeMap::new();
    for component in &definition.components {
        let raw = components
            .get(&component.id)
            .filter(|value| !is_blank(value));
        match raw {
            Some(raw) => {
                let value = component_value(&component.id, &component.kind, raw)?;
                accepted.insert(component.id.clone(), value);
            }
            None if component.required => {
                return Err(ValidationError::MissingRequired(component.id.clone()));
            }
            None => {}
        }
    }

    Ok(StageSubmission::FormSubmission(FormSubmission {
        components: accepted,
        submitted_at: now,
    }))
}

/// Build and auto-grade a test submission, enforcing the stage's time limit.
pub fn test_submission(
    definition: &TestDefinition,
    stage: &Stage,
    started_at: DateTime<Utc>,
    answers: BTreeMap<FieldId, Value>,
    now: DateTime<Utc>,
) -> Result<StageSubmission, ValidationError> {
    if started_at > now {
        return Err(ValidationError::StartedInFuture(started_at));
    }
    if let Some(limit_minutes) = stage.test_duration {
        if now - started_at > Duration::minutes(i64::from(limit_minutes)) {
            return Err(ValidationError::TimeLimitExceeded { limit_minutes });
        }
    }

    let mut graded = BTreeMap::new();
    for (id, raw) in answers {
        let question = definition
            .question(&id)
            .ok_or_else(|| ValidationError::UnknownField(id.clone()))?;
        if is_blank(&raw) {
            continue;
        }

        let submission = match &question.kind {
            QuestionKind::SingleChoice { options, correct } => {
                let choice = expect_text(&id, &raw, "a single option")?;
                ensure_option(&id, options, &choice)?;
                let grade = if &choice == correct {
                    question.points
                } else {
                    0.0
                };
                QuestionSubmission {
                    answer: QuestionAnswer::Choice(choice),
                    grade,
                }
            }
            QuestionKind::MultipleChoice { options, correct } => {
                let choices = expect_selections(&id, &raw, options)?;
                let picked: BTreeSet<&String> = choices.iter().collect();
                let expected: BTreeSet<&String> = correct.iter().collect();
                let grade = if picked == expected {
                    question.points
                } else {
                    0.0
                };
                QuestionSubmission {
                    answer: QuestionAnswer::Choices(choices),
                    grade,
                }
            }
            QuestionKind::OpenEnded => QuestionSubmission {
                answer: QuestionAnswer::Text(expect_text(&id, &raw, "free text")?),
                grade: 0.0,
            },
        };
        graded.insert(id, submission);
    }

    let grade = graded.values().map(|answer| answer.grade).sum();

    Ok(StageSubmission::TestSubmission(TestSubmission {
        answers: graded,
        grade,
        total_points: definition.total_points(),
        started_at,
        submitted_at: now,
    }))
}

pub fn interview_submission(
    notes: String,
    grade: f64,
    interviewer: UserId,
    now: DateTime<Utc>,
) -> Result<StageSubmission, ValidationError> {
    if !grade.is_finite() {
        return Err(ValidationError::InvalidGrade);
    }

    Ok(StageSubmission::InterviewSubmission(InterviewSubmission {
        notes,
        grade,
        interviewer,
        submitted_at: now,
    }))
}

fn component_value(
    id: &FieldId,
    kind: &ComponentKind,
    raw: &Value,
) -> Result<ComponentSubmission, ValidationError> {
    let value = match kind {
        ComponentKind::ShortText => ComponentSubmission::ShortText(expect_text(id, raw, "text")?),
        ComponentKind::LongText => ComponentSubmission::LongText(expect_text(id, raw, "text")?),
        ComponentKind::Address => {
            ComponentSubmission::Address(expect_text(id, raw, "an address")?)
        }
        ComponentKind::Phone => {
            let phone = expect_text(id, raw, "a phone number")?;
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
            if !allowed || digits < 6 {
                return Err(ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "a phone number",
                });
            }
            ComponentSubmission::Phone(phone)
        }
        ComponentKind::SingleChoice { options } => {
            let choice = expect_text(id, raw, "a single option")?;
            ensure_option(id, options, &choice)?;
            ComponentSubmission::SingleChoice(choice)
        }
        ComponentKind::Dropdown { options } => {
            let choice = expect_text(id, raw, "a single option")?;
            ensure_option(id, options, &choice)?;
            ComponentSubmission::Dropdown(choice)
        }
        ComponentKind::MultipleChoice { options } => {
            ComponentSubmission::MultipleChoice(expect_selections(id, raw, options)?)
        }
        ComponentKind::Number => {
            let number = raw
                .as_f64()
                .filter(|number| number.is_finite())
                .ok_or_else(|| ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "a number",
                })?;
            ComponentSubmission::Number(number)
        }
        ComponentKind::Date => {
            let date = raw
                .as_str()
                .and_then(parse_instant)
                .ok_or_else(|| ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "an RFC 3339 timestamp or YYYY-MM-DD date",
                })?;
            ComponentSubmission::Date(date)
        }
        ComponentKind::FullName => {
            let name: FullName =
                serde_json::from_value(raw.clone()).map_err(|_| ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "an object with name and surname",
                })?;
            if name.name.trim().is_empty() || name.surname.trim().is_empty() {
                return Err(ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "a non-empty name and surname",
                });
            }
            ComponentSubmission::FullName(name)
        }
        ComponentKind::FileUpload => {
            let file: FileReference =
                serde_json::from_value(raw.clone()).map_err(|_| ValidationError::ShapeMismatch {
                    field: id.clone(),
                    expected: "an uploaded file reference",
                })?;
            ComponentSubmission::File(file)
        }
    };
    Ok(value)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn expect_text(
    id: &FieldId,
    raw: &Value,
    expected: &'static str,
) -> Result<String, ValidationError> {
    raw.as_str()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ValidationError::ShapeMismatch {
            field: id.clone(),
            expected,
        })
}

fn expect_selections(
    id: &FieldId,
    raw: &Value,
    options: &[String],
) -> Result<Vec<String>, ValidationError> {
    let mismatch = || ValidationError::ShapeMismatch {
        field: id.clone(),
        expected: "a list of options",
    };
    let items = raw.as_array().ok_or_else(mismatch)?;

    let mut selections = Vec::with_capacity(items.len());
    for item in items {
        let choice = item.as_str().ok_or_else(mismatch)?.trim().to_string();
        ensure_option(id, options, &choice)?;
        if !selections.contains(&choice) {
            selections.push(choice);
        }
    }
    Ok(selections)
}

fn ensure_option(id: &FieldId, options: &[String], choice: &str) -> Result<(), ValidationError> {
    if options.iter().any(|option| option == choice) {
        Ok(())
    } else {
        Err(ValidationError::OptionNotAllowed {
            field: id.clone(),
            option: choice.to_string(),
        })
    }
}

pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
