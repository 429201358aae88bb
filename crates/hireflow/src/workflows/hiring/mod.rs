//! Hiring flows: ordered stages joined by conditional edges, and applicants moving through them.
//!
//! Recruiters author a flow through [`FlowService`]; once the flow is active, applicants register
//! and submit stage results through [`ProgressionService`], which evaluates the outgoing
//! condition, advances the applicant, and asks the notification port to invite them onward.

pub mod authoring;
pub mod domain;
pub mod errors;
pub mod evaluation;
pub mod graph;
pub mod notification;
pub mod progression;
pub mod repository;
pub mod router;
pub mod service;
pub mod submission;

#[cfg(test)]
mod tests;

pub use authoring::{FlowService, NewFlow};
pub use domain::{
    normalize_email, Applicant, ApplicantId, ComparableValue, Condition, FieldId, Flow, FlowId,
    Operation, ReferenceId, Stage, StageId, StageType, UserId,
};
pub use errors::{NotFound, TransitionError, ValidationError};
pub use evaluation::{BranchDecision, ConditionEvaluator};
pub use graph::{StageDraft, StagePatch};
pub use notification::{
    Delivery, Notification, NotificationComposer, NotificationError, NotificationPublisher,
    TemplateKind,
};
pub use progression::ProgressState;
pub use repository::{
    ApplicantRepository, DefinitionCatalog, DirectoryError, FlowRepository, HiringPorts,
    RepositoryError, UserDirectory,
};
pub use router::{hiring_router, HiringState, USER_HEADER};
pub use service::{
    AdvanceOutcome, ApplicantStatusView, HiringServiceError, ProgressionService,
    ProgressionSettings, Registration, RegistrationOutcome, SubmissionOutcome,
};
pub use submission::{
    ComponentKind, ComponentSubmission, FileReference, FormComponent, FormDefinition,
    FormSubmission, FullName, InterviewSubmission, Question, QuestionAnswer, QuestionKind,
    QuestionSubmission, StageSubmission, SubmissionPayload, TestDefinition, TestSubmission,
};
