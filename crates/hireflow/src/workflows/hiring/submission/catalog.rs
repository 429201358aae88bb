use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::super::domain::{FieldId, ReferenceId};
use super::super::errors::ValidationError;

/// Form referenced by FORM stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub id: ReferenceId,
    pub name: String,
    pub components: Vec<FormComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormComponent {
    pub id: FieldId,
    pub label: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub required: bool,
}

/// Declared answer shape of a form component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    ShortText,
    LongText,
    Address,
    Phone,
    SingleChoice { options: Vec<String> },
    Dropdown { options: Vec<String> },
    MultipleChoice { options: Vec<String> },
    Number,
    Date,
    FullName,
    FileUpload,
}

impl ComponentKind {
    fn options(&self) -> Option<&[String]> {
        match self {
            ComponentKind::SingleChoice { options }
            | ComponentKind::Dropdown { options }
            | ComponentKind::MultipleChoice { options } => Some(options),
            _ => None,
        }
    }
}

impl FormDefinition {
    pub fn component(&self, id: &FieldId) -> Option<&FormComponent> {
        self.components.iter().find(|component| &component.id == id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for component in &self.components {
            if !seen.insert(&component.id) {
                return Err(ValidationError::DuplicateField(component.id.clone()));
            }
            if let Some(options) = component.kind.options() {
                check_options(&component.id, options)?;
            }
        }
        Ok(())
    }
}

/// Test referenced by TEST stages; choice questions carry their answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: ReferenceId,
    pub name: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: FieldId,
    pub prompt: String,
    pub points: f64,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<String>,
        correct: String,
    },
    MultipleChoice {
        options: Vec<String>,
        correct: Vec<String>,
    },
    /// Graded by a reviewer later; earns nothing at submission time.
    OpenEnded,
}

impl TestDefinition {
    pub fn question(&self, id: &FieldId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }

    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|question| question.points).sum()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if !seen.insert(&question.id) {
                return Err(ValidationError::DuplicateField(question.id.clone()));
            }
            if !question.points.is_finite() || question.points < 0.0 {
                return Err(ValidationError::InvalidDefinition(format!(
                    "question {} must be worth a non-negative number of points",
                    question.id
                )));
            }
            match &question.kind {
                QuestionKind::SingleChoice { options, correct } => {
                    check_options(&question.id, options)?;
                    if !options.contains(correct) {
                        return Err(ValidationError::OptionNotAllowed {
                            field: question.id.clone(),
                            option: correct.clone(),
                        });
                    }
                }
                QuestionKind::MultipleChoice { options, correct } => {
                    check_options(&question.id, options)?;
                    if let Some(missing) = correct.iter().find(|value| !options.contains(value)) {
                        return Err(ValidationError::OptionNotAllowed {
                            field: question.id.clone(),
                            option: missing.clone(),
                        });
                    }
                }
                QuestionKind::OpenEnded => {}
            }
        }
        Ok(())
    }
}

fn check_options(field: &FieldId, options: &[String]) -> Result<(), ValidationError> {
    if options.is_empty() {
        return Err(ValidationError::InvalidDefinition(format!(
            "field {field} declares no options"
        )));
    }
    let unique: BTreeSet<&String> = options.iter().collect();
    if unique.len() != options.len() {
        return Err(ValidationError::InvalidDefinition(format!(
            "field {field} repeats an option"
        )));
    }
    Ok(())
}
