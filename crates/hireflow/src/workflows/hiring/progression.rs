//! Applicant position tracking over a flow's ordered stages.
//!
//! ```text
//! at(i) awaiting ──submit──▶ at(i) submitted ──advance──▶ at(i+1)
//!                                                │
//!                        i + 1 == stages.len()   ▼
//!                                            completed
//! ```
//!
//! Transitions only touch the in-memory record; persistence and notification belong to the
//! service layer.

use serde::Serialize;

use super::domain::{Applicant, Flow, Stage, StageId};
use super::errors::{NotFound, TransitionError, ValidationError};
use super::graph::{stage_at, stage_index_of};
use super::submission::StageSubmission;

/// Where an applicant sits relative to the flow's stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage_index", rename_all = "snake_case")]
pub enum ProgressState {
    AwaitingSubmission(usize),
    SubmittedAwaitingAdvance(usize),
    Completed,
}

impl ProgressState {
    pub fn of(applicant: &Applicant, flow: &Flow) -> Self {
        if applicant.stage_index >= flow.stages.len() {
            ProgressState::Completed
        } else if applicant.stage_completed {
            ProgressState::SubmittedAwaitingAdvance(applicant.stage_index)
        } else {
            ProgressState::AwaitingSubmission(applicant.stage_index)
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ProgressState::AwaitingSubmission(_) => "awaiting_submission",
            ProgressState::SubmittedAwaitingAdvance(_) => "submitted_awaiting_advance",
            ProgressState::Completed => "completed",
        }
    }
}

/// Submission against a stage the applicant cannot act on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Record `submission` for `stage_id` and mark the current stage as completed.
///
/// Checks run in a fixed order: a finished applicant always gets `WrongStage`, an existing
/// submission for the stage gets `DuplicateSubmission`, and any other index mismatch gets
/// `WrongStage`. The submission variant must match the stage type.
pub fn submit(
    applicant: &mut Applicant,
    flow: &Flow,
    stage_id: &StageId,
    submission: StageSubmission,
) -> Result<(), SubmitError> {
    let requested = ensure_can_submit(applicant, flow, stage_id)?;

    let expected = flow.stages[requested].stage_type;
    if submission.stage_type() != expected {
        return Err(ValidationError::SubmissionTypeMismatch {
            expected,
            found: submission.stage_type(),
        }
        .into());
    }

    applicant
        .stage_submissions
        .insert(stage_id.clone(), submission);
    applicant.stage_completed = true;
    Ok(())
}

/// Transition checks for `submit` without touching the record; returns the stage's index.
pub fn ensure_can_submit(
    applicant: &Applicant,
    flow: &Flow,
    stage_id: &StageId,
) -> Result<usize, SubmitError> {
    let requested = stage_index_of(flow, stage_id)?;

    if applicant.stage_index >= flow.stages.len() {
        return Err(TransitionError::WrongStage {
            current: applicant.stage_index,
            requested,
        }
        .into());
    }
    if applicant.has_submitted(stage_id) {
        return Err(TransitionError::DuplicateSubmission(stage_id.clone()).into());
    }
    if applicant.stage_index != requested || applicant.stage_completed {
        return Err(TransitionError::WrongStage {
            current: applicant.stage_index,
            requested,
        }
        .into());
    }
    Ok(requested)
}

/// Result of a successful advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance<'a> {
    pub from_index: usize,
    /// Stage the applicant must act on next; `None` once every stage is done.
    pub next: Option<&'a Stage>,
}

pub fn advance<'a>(
    applicant: &mut Applicant,
    flow: &'a Flow,
) -> Result<Advance<'a>, TransitionError> {
    if applicant.stage_index >= flow.stages.len() {
        return Err(TransitionError::AlreadyCompleted);
    }
    if !applicant.stage_completed {
        return Err(TransitionError::NotReady);
    }

    let from_index = applicant.stage_index;
    applicant.stage_index += 1;
    applicant.stage_completed = false;

    Ok(Advance {
        from_index,
        next: stage_at(flow, applicant.stage_index),
    })
}
