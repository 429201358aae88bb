use chrono::{DateTime, Utc};

use super::domain::{ApplicantId, FieldId, FlowId, Operation, ReferenceId, StageId, StageType};

/// Lookup failures for flow-owned and catalog-owned records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotFound {
    #[error("flow {0} not found")]
    Flow(FlowId),
    #[error("stage {0} not found in flow")]
    Stage(StageId),
    #[error("applicant {0} not found")]
    Applicant(ApplicantId),
    #[error("no condition leaves stage {0}")]
    Condition(StageId),
    #[error("form definition {0} not found")]
    Form(ReferenceId),
    #[error("test definition {0} not found")]
    Test(ReferenceId),
}

/// Rejected applicant state-machine transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("applicant is at stage index {current}, submission targets index {requested}")]
    WrongStage { current: usize, requested: usize },
    #[error("applicant has already completed every stage")]
    AlreadyCompleted,
    #[error("applicant has not submitted the current stage")]
    NotReady,
    #[error("stage {0} already has a submission")]
    DuplicateSubmission(StageId),
}

/// Shape and rule violations in submissions, definitions, and flow edits.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("field {0} is not part of the stage definition")]
    UnknownField(FieldId),
    #[error("required field {0} is missing")]
    MissingRequired(FieldId),
    #[error("field {field} expects {expected}")]
    ShapeMismatch {
        field: FieldId,
        expected: &'static str,
    },
    #[error("field {field} does not offer option '{option}'")]
    OptionNotAllowed { field: FieldId, option: String },
    #[error("field {0} is declared more than once")]
    DuplicateField(FieldId),
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
    #[error("{found:?} submission sent to a {expected:?} stage")]
    SubmissionTypeMismatch {
        expected: StageType,
        found: StageType,
    },
    #[error("stage {0} cannot be changed after creation")]
    ImmutableStageField(&'static str),
    #[error("flow is active; stages and conditions are locked")]
    FlowActive,
    #[error("flow is not accepting applicants")]
    FlowClosed,
    #[error("flow already has applicants; its stages cannot be removed")]
    FlowHasApplicants,
    #[error("flow needs at least one stage before activation")]
    EmptyFlow,
    #[error("start date must not be after end date")]
    InvalidDateRange,
    #[error("test duration must be a positive number of minutes on a test stage")]
    InvalidTestDuration,
    #[error("condition must connect stage {from} to the stage directly after it, not {to}")]
    ConditionNotAdjacent { from: StageId, to: StageId },
    #[error("stage {0} already has an outgoing condition")]
    ConditionExists(StageId),
    #[error("operation {operation:?} cannot compare {reason}")]
    IncompatibleCondition {
        operation: Operation,
        reason: &'static str,
    },
    #[error("stage {0} is not open for submissions")]
    StageClosed(StageId),
    #[error("test start time {0} is after the submission time")]
    StartedInFuture(DateTime<Utc>),
    #[error("test time limit of {limit_minutes} minutes exceeded")]
    TimeLimitExceeded { limit_minutes: u32 },
    #[error("grade must be a finite number")]
    InvalidGrade,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}
