//! Condition evaluation against a just-completed stage submission.
//!
//! Evaluation is a pure function of the condition and the submission. FORM edges inspect one
//! component picked by `field`; TEST edges compare the percentage score and INTERVIEW edges the
//! interviewer's grade, and both only when `field` is absent.

mod rules;

use serde::{Deserialize, Serialize};

use super::domain::{Condition, Flow, StageId};
use super::graph::outgoing_condition;
use super::submission::StageSubmission;
use rules::{compare, compare_score, Operand};

/// Stateless evaluator for condition edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(&self, condition: &Condition, submission: &StageSubmission) -> bool {
        match (submission, &condition.field) {
            (StageSubmission::FormSubmission(form), Some(field)) => form
                .components
                .get(field)
                .map(|component| {
                    compare(Operand::of(component), condition.operation, &condition.value)
                })
                .unwrap_or(false),
            (StageSubmission::FormSubmission(_), None) => false,
            (StageSubmission::TestSubmission(test), None) => test
                .percentage()
                .map(|score| compare_score(score, condition.operation, &condition.value))
                .unwrap_or(false),
            (StageSubmission::InterviewSubmission(interview), None) => {
                compare_score(interview.grade, condition.operation, &condition.value)
            }
            (
                StageSubmission::TestSubmission(_) | StageSubmission::InterviewSubmission(_),
                Some(_),
            ) => false,
        }
    }

    /// Decide whether an applicant who just completed `stage_id` moves on.
    pub fn decide(
        &self,
        flow: &Flow,
        stage_id: &StageId,
        submission: &StageSubmission,
    ) -> BranchDecision {
        match outgoing_condition(flow, stage_id) {
            None => BranchDecision::Unconditional,
            Some(condition) if self.evaluate(condition, submission) => BranchDecision::Satisfied,
            Some(_) => BranchDecision::Unsatisfied,
        }
    }
}

/// Outcome of consulting the stage graph after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchDecision {
    /// No edge leaves the stage.
    Unconditional,
    Satisfied,
    /// The applicant stays parked at the completed stage.
    Unsatisfied,
}

impl BranchDecision {
    pub const fn advances(self) -> bool {
        matches!(self, BranchDecision::Unconditional | BranchDecision::Satisfied)
    }

    pub const fn label(self) -> &'static str {
        match self {
            BranchDecision::Unconditional => "unconditional",
            BranchDecision::Satisfied => "satisfied",
            BranchDecision::Unsatisfied => "unsatisfied",
        }
    }
}
