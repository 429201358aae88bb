use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{normalize_email, Applicant, ApplicantId, Flow, FlowId, StageId, UserId};
use super::errors::{NotFound, TransitionError, ValidationError};
use super::evaluation::{BranchDecision, ConditionEvaluator};
use super::graph::{stage_index_of, UpdateError};
use super::notification::{Delivery, Notification, NotificationComposer};
use super::progression::{self, ProgressState, SubmitError};
use super::repository::{DirectoryError, HiringPorts, RepositoryError, UserDirectory};
use super::submission::{intake, StageSubmission, SubmissionPayload};

/// Error raised by the hiring services.
#[derive(Debug, thiserror::Error)]
pub enum HiringServiceError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user {user} may not {action}")]
    Authorization { user: UserId, action: &'static str },
    #[error(transparent)]
    Upstream(#[from] DirectoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<SubmitError> for HiringServiceError {
    fn from(value: SubmitError) -> Self {
        match value {
            SubmitError::NotFound(err) => Self::NotFound(err),
            SubmitError::Transition(err) => Self::InvalidTransition(err),
            SubmitError::Validation(err) => Self::Validation(err),
        }
    }
}

impl From<UpdateError> for HiringServiceError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::NotFound(err) => Self::NotFound(err),
            UpdateError::Validation(err) => Self::Validation(err),
        }
    }
}

/// Fail closed: a directory error aborts the operation just like a denial.
pub(crate) fn require_flow_access(
    directory: &dyn UserDirectory,
    user: &UserId,
    flow_id: &FlowId,
    action: &'static str,
) -> Result<(), HiringServiceError> {
    if directory.is_authorized(user, flow_id)? {
        Ok(())
    } else {
        Err(HiringServiceError::Authorization {
            user: user.clone(),
            action,
        })
    }
}

/// Knobs for applicant-facing side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionSettings {
    pub link_base_url: String,
    /// Send a `stage-submitted` receipt after every stored submission.
    pub submission_receipts: bool,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            link_base_url: "http://localhost:3000".to_string(),
            submission_receipts: false,
        }
    }
}

/// Sanitized representation of an applicant's position and recorded answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantStatusView {
    pub applicant_id: ApplicantId,
    pub flow_id: FlowId,
    pub email: String,
    pub name: String,
    pub stage_index: usize,
    pub stage_completed: bool,
    pub state: ProgressState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageId>,
    pub stage_submissions: BTreeMap<StageId, StageSubmission>,
}

impl ApplicantStatusView {
    pub fn new(applicant: &Applicant, flow: &Flow) -> Self {
        Self {
            applicant_id: applicant.id.clone(),
            flow_id: applicant.flow_id.clone(),
            email: applicant.email.clone(),
            name: applicant.name.clone(),
            stage_index: applicant.stage_index,
            stage_completed: applicant.stage_completed,
            state: ProgressState::of(applicant, flow),
            current_stage: flow
                .stages
                .get(applicant.stage_index)
                .map(|stage| stage.id.clone()),
            stage_submissions: applicant.stage_submissions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registration {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub applicant: ApplicantStatusView,
    pub notification: Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub applicant: ApplicantStatusView,
    pub decision: BranchDecision,
    pub advanced: bool,
    pub notification: Delivery,
    pub receipt: Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceOutcome {
    pub applicant: ApplicantStatusView,
    pub notification: Delivery,
}

/// Drives applicants through a flow: intake, condition evaluation, advance, notification.
pub struct ProgressionService {
    ports: HiringPorts,
    evaluator: ConditionEvaluator,
    composer: NotificationComposer,
    settings: ProgressionSettings,
}

impl ProgressionService {
    pub fn new(ports: HiringPorts, settings: ProgressionSettings) -> Self {
        Self {
            ports,
            evaluator: ConditionEvaluator,
            composer: NotificationComposer::new(settings.link_base_url.clone()),
            settings,
        }
    }

    /// Enter an applicant into an active flow and invite them to the first stage.
    pub fn register_applicant(
        &self,
        flow_id: &FlowId,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, HiringServiceError> {
        let flow = self.load_flow(flow_id)?;
        if !flow.accepts_applicants_at(now) {
            return Err(ValidationError::FlowClosed.into());
        }

        let email = normalize_email(&registration.email);
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail(registration.email).into());
        }
        if self
            .ports
            .applicants
            .find_by_email(flow_id, &email)?
            .is_some()
        {
            return Err(RepositoryError::Conflict.into());
        }

        let applicant = Applicant::new(flow.id.clone(), &email, registration.name, now);
        let applicant = self.ports.applicants.insert(applicant)?;
        info!(applicant_id = %applicant.id, flow_id = %flow.id, "applicant registered");

        let notification = match flow.stages.first() {
            Some(stage) => self.dispatch(
                &applicant.id,
                self.composer.next_stage_ready(&applicant, &flow, stage),
            ),
            None => Delivery::Skipped,
        };

        Ok(RegistrationOutcome {
            applicant: ApplicantStatusView::new(&applicant, &flow),
            notification,
        })
    }

    pub fn applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<ApplicantStatusView, HiringServiceError> {
        let applicant = self.load_applicant(applicant_id)?;
        let flow = self.load_flow(&applicant.flow_id)?;
        Ok(ApplicantStatusView::new(&applicant, &flow))
    }

    pub fn applicants_for_flow(
        &self,
        user: &UserId,
        flow_id: &FlowId,
    ) -> Result<Vec<ApplicantStatusView>, HiringServiceError> {
        require_flow_access(
            self.ports.directory.as_ref(),
            user,
            flow_id,
            "list applicants",
        )?;
        let flow = self.load_flow(flow_id)?;
        let applicants = self.ports.applicants.list_for_flow(flow_id)?;
        Ok(applicants
            .iter()
            .map(|applicant| ApplicantStatusView::new(applicant, &flow))
            .collect())
    }

    /// Record a stage submission, evaluate the outgoing condition, and advance when it allows.
    ///
    /// `actor` is only consulted for interview stages, which are submitted by an interviewer on
    /// the applicant's behalf.
    pub fn submit_stage(
        &self,
        actor: Option<&UserId>,
        applicant_id: &ApplicantId,
        stage_id: &StageId,
        payload: SubmissionPayload,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, HiringServiceError> {
        let mut applicant = self.load_applicant(applicant_id)?;
        let flow = self.load_flow(&applicant.flow_id)?;
        let index = stage_index_of(&flow, stage_id)?;
        let stage = &flow.stages[index];

        if payload.stage_type() != stage.stage_type {
            return Err(ValidationError::SubmissionTypeMismatch {
                expected: stage.stage_type,
                found: payload.stage_type(),
            }
            .into());
        }
        let interviewer = match &payload {
            SubmissionPayload::Interview { .. } => {
                Some(self.require_interviewer(actor, &flow.id)?)
            }
            _ => None,
        };
        progression::ensure_can_submit(&applicant, &flow, stage_id)?;
        if !stage.is_open_at(now) {
            return Err(ValidationError::StageClosed(stage.id.clone()).into());
        }

        let submission = match (payload, interviewer) {
            (SubmissionPayload::Form { components }, _) => {
                let form = self
                    .ports
                    .catalog
                    .form(&stage.reference_id)?
                    .ok_or_else(|| NotFound::Form(stage.reference_id.clone()))?;
                intake::form_submission(&form, components, now)?
            }
            (
                SubmissionPayload::Test {
                    started_at,
                    answers,
                },
                _,
            ) => {
                let test = self
                    .ports
                    .catalog
                    .test(&stage.reference_id)?
                    .ok_or_else(|| NotFound::Test(stage.reference_id.clone()))?;
                intake::test_submission(&test, stage, started_at, answers, now)?
            }
            (SubmissionPayload::Interview { notes, grade }, Some(interviewer)) => {
                intake::interview_submission(notes, grade, interviewer, now)?
            }
            (SubmissionPayload::Interview { .. }, None) => {
                return Err(anonymous_interviewer());
            }
        };

        let decision = self.evaluator.decide(&flow, stage_id, &submission);
        progression::submit(&mut applicant, &flow, stage_id, submission)?;
        let advanced = if decision.advances() {
            progression::advance(&mut applicant, &flow)?;
            true
        } else {
            false
        };

        let expected_version = applicant.version;
        let stored = match self.ports.applicants.update(applicant, expected_version) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                let current = self.load_applicant(applicant_id)?;
                if current.has_submitted(stage_id) {
                    return Err(TransitionError::DuplicateSubmission(stage_id.clone()).into());
                }
                return Err(RepositoryError::Conflict.into());
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            applicant_id = %stored.id,
            flow_id = %flow.id,
            stage_id = %stage_id,
            decision = decision.label(),
            stage_index = stored.stage_index,
            "stage submission recorded"
        );

        let receipt = if self.settings.submission_receipts {
            self.dispatch(
                &stored.id,
                self.composer.stage_submitted(&stored, &flow, &flow.stages[index]),
            )
        } else {
            Delivery::Skipped
        };
        let notification = if advanced {
            self.notify_next_stage(&stored, &flow)
        } else {
            Delivery::Skipped
        };

        Ok(SubmissionOutcome {
            applicant: ApplicantStatusView::new(&stored, &flow),
            decision,
            advanced,
            notification,
            receipt,
        })
    }

    /// Manually move a parked applicant past a completed stage.
    pub fn advance(
        &self,
        user: &UserId,
        applicant_id: &ApplicantId,
    ) -> Result<AdvanceOutcome, HiringServiceError> {
        let mut applicant = self.load_applicant(applicant_id)?;
        require_flow_access(
            self.ports.directory.as_ref(),
            user,
            &applicant.flow_id,
            "advance applicants",
        )?;
        let flow = self.load_flow(&applicant.flow_id)?;

        progression::advance(&mut applicant, &flow)?;
        let expected_version = applicant.version;
        let stored = self.ports.applicants.update(applicant, expected_version)?;
        info!(
            applicant_id = %stored.id,
            flow_id = %flow.id,
            stage_index = stored.stage_index,
            "applicant advanced manually"
        );

        let notification = self.notify_next_stage(&stored, &flow);
        Ok(AdvanceOutcome {
            applicant: ApplicantStatusView::new(&stored, &flow),
            notification,
        })
    }

    fn notify_next_stage(&self, applicant: &Applicant, flow: &Flow) -> Delivery {
        match flow.stages.get(applicant.stage_index) {
            Some(stage) => self.dispatch(
                &applicant.id,
                self.composer.next_stage_ready(applicant, flow, stage),
            ),
            None => {
                debug!(applicant_id = %applicant.id, "applicant completed every stage");
                Delivery::Skipped
            }
        }
    }

    fn dispatch(&self, applicant_id: &ApplicantId, notification: Notification) -> Delivery {
        let template = notification.template;
        match self.ports.notifications.send(notification) {
            Ok(()) => Delivery::Sent,
            Err(err) => {
                warn!(
                    applicant_id = %applicant_id,
                    ?template,
                    error = %err,
                    "notification dispatch failed"
                );
                Delivery::Failed(err.to_string())
            }
        }
    }

    fn require_interviewer(
        &self,
        actor: Option<&UserId>,
        flow_id: &FlowId,
    ) -> Result<UserId, HiringServiceError> {
        let Some(user) = actor else {
            return Err(anonymous_interviewer());
        };
        if !self.ports.directory.is_interviewer(user)? {
            return Err(HiringServiceError::Authorization {
                user: user.clone(),
                action: "submit interview results",
            });
        }
        require_flow_access(
            self.ports.directory.as_ref(),
            user,
            flow_id,
            "submit interview results",
        )?;
        Ok(user.clone())
    }

    fn load_flow(&self, flow_id: &FlowId) -> Result<Flow, HiringServiceError> {
        Ok(self
            .ports
            .flows
            .fetch(flow_id)?
            .ok_or_else(|| NotFound::Flow(flow_id.clone()))?)
    }

    fn load_applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Applicant, HiringServiceError> {
        Ok(self
            .ports
            .applicants
            .fetch(applicant_id)?
            .ok_or_else(|| NotFound::Applicant(applicant_id.clone()))?)
    }
}

fn anonymous_interviewer() -> HiringServiceError {
    HiringServiceError::Authorization {
        user: UserId::from("anonymous"),
        action: "submit interview results",
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
