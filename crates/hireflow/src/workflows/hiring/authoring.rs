use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::domain::{Condition, Flow, FlowId, Stage, StageId, StageType, UserId};
use super::errors::{NotFound, ValidationError};
use super::graph::{self, StageDraft, StagePatch};
use super::repository::HiringPorts;
use super::service::{require_flow_access, HiringServiceError};
use super::submission::{FormDefinition, TestDefinition};

/// Fields supplied when creating a flow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFlow {
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Recruiter-facing flow authoring: stages, conditional edges, catalog definitions, activation.
pub struct FlowService {
    ports: HiringPorts,
}

impl FlowService {
    pub fn new(ports: HiringPorts) -> Self {
        Self { ports }
    }

    pub fn create_flow(
        &self,
        user: &UserId,
        new_flow: NewFlow,
    ) -> Result<Flow, HiringServiceError> {
        self.require_recruiter(user, "create flows")?;
        if new_flow.name.trim().is_empty() || new_flow.company.trim().is_empty() {
            return Err(ValidationError::InvalidDefinition(
                "flow name and company are required".to_string(),
            )
            .into());
        }
        if let (Some(start), Some(end)) = (new_flow.start_date, new_flow.end_date) {
            if start > end {
                return Err(ValidationError::InvalidDateRange.into());
            }
        }

        let mut flow = Flow::new(new_flow.name.trim(), new_flow.company.trim());
        flow.start_date = new_flow.start_date;
        flow.end_date = new_flow.end_date;
        let flow = self.ports.flows.insert(flow)?;
        info!(flow_id = %flow.id, user = %user, "flow created");
        Ok(flow)
    }

    pub fn flow(&self, user: &UserId, flow_id: &FlowId) -> Result<Flow, HiringServiceError> {
        require_flow_access(self.ports.directory.as_ref(), user, flow_id, "view flows")?;
        self.load(flow_id)
    }

    pub fn define_form(
        &self,
        user: &UserId,
        form: FormDefinition,
    ) -> Result<FormDefinition, HiringServiceError> {
        self.require_recruiter(user, "define forms")?;
        form.validate()?;
        self.ports.catalog.insert_form(form.clone())?;
        debug!(reference_id = %form.id, components = form.components.len(), "form defined");
        Ok(form)
    }

    pub fn define_test(
        &self,
        user: &UserId,
        test: TestDefinition,
    ) -> Result<TestDefinition, HiringServiceError> {
        self.require_recruiter(user, "define tests")?;
        test.validate()?;
        self.ports.catalog.insert_test(test.clone())?;
        debug!(
            reference_id = %test.id,
            questions = test.questions.len(),
            total_points = test.total_points(),
            "test defined"
        );
        Ok(test)
    }

    /// Append a stage; FORM and TEST stages must point at an existing catalog entry.
    pub fn add_stage(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        draft: StageDraft,
    ) -> Result<Stage, HiringServiceError> {
        let mut flow = self.load_for_edit(user, flow_id)?;
        match draft.stage_type {
            StageType::Form => {
                if self.ports.catalog.form(&draft.reference_id)?.is_none() {
                    return Err(NotFound::Form(draft.reference_id).into());
                }
            }
            StageType::Test => {
                if self.ports.catalog.test(&draft.reference_id)?.is_none() {
                    return Err(NotFound::Test(draft.reference_id).into());
                }
            }
            StageType::Interview => {}
        }

        let stage = graph::append_stage(&mut flow, draft)?.clone();
        self.ports.flows.update(flow)?;
        info!(
            flow_id = %flow_id,
            stage_id = %stage.id,
            stage_type = stage.stage_type.label(),
            "stage added"
        );
        Ok(stage)
    }

    pub fn update_stage(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        stage_id: &StageId,
        patch: StagePatch,
    ) -> Result<Stage, HiringServiceError> {
        let mut flow = self.load_for_edit(user, flow_id)?;
        let stage = graph::update_stage(&mut flow, stage_id, patch)?;
        self.ports.flows.update(flow)?;
        debug!(flow_id = %flow_id, stage_id = %stage_id, "stage updated");
        Ok(stage)
    }

    /// Remove a stage and its edges. Refused once applicants hold positions in the flow.
    pub fn remove_stage(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        stage_id: &StageId,
    ) -> Result<Stage, HiringServiceError> {
        let mut flow = self.load_for_edit(user, flow_id)?;
        graph::stage_index_of(&flow, stage_id)?;
        if !self.ports.applicants.list_for_flow(flow_id)?.is_empty() {
            return Err(ValidationError::FlowHasApplicants.into());
        }

        let removed = graph::remove_stage(&mut flow, stage_id)?;
        self.ports.flows.update(flow)?;
        info!(flow_id = %flow_id, stage_id = %stage_id, "stage removed");
        Ok(removed)
    }

    pub fn add_condition(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        condition: Condition,
    ) -> Result<Condition, HiringServiceError> {
        let mut flow = self.load_for_edit(user, flow_id)?;
        graph::add_condition(&mut flow, condition.clone())?;
        self.ports.flows.update(flow)?;
        info!(
            flow_id = %flow_id,
            from = %condition.from,
            to = %condition.to,
            operation = ?condition.operation,
            "condition added"
        );
        Ok(condition)
    }

    pub fn remove_condition(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        from: &StageId,
    ) -> Result<Condition, HiringServiceError> {
        let mut flow = self.load_for_edit(user, flow_id)?;
        let removed = graph::remove_condition(&mut flow, from)?;
        self.ports.flows.update(flow)?;
        debug!(flow_id = %flow_id, from = %from, "condition removed");
        Ok(removed)
    }

    /// Open or close the flow to registrations. A flow needs a stage before it can open.
    pub fn set_active(
        &self,
        user: &UserId,
        flow_id: &FlowId,
        active: bool,
    ) -> Result<Flow, HiringServiceError> {
        require_flow_access(
            self.ports.directory.as_ref(),
            user,
            flow_id,
            "change flow activation",
        )?;
        let mut flow = self.load(flow_id)?;
        if active && flow.stages.is_empty() {
            return Err(ValidationError::EmptyFlow.into());
        }
        if flow.active != active {
            flow.active = active;
            self.ports.flows.update(flow.clone())?;
            info!(flow_id = %flow_id, active, "flow activation changed");
        }
        Ok(flow)
    }

    fn load_for_edit(&self, user: &UserId, flow_id: &FlowId) -> Result<Flow, HiringServiceError> {
        require_flow_access(self.ports.directory.as_ref(), user, flow_id, "edit flows")?;
        self.load(flow_id)
    }

    fn load(&self, flow_id: &FlowId) -> Result<Flow, HiringServiceError> {
        self.ports
            .flows
            .fetch(flow_id)?
            .ok_or_else(|| NotFound::Flow(flow_id.clone()).into())
    }

    fn require_recruiter(
        &self,
        user: &UserId,
        action: &'static str,
    ) -> Result<(), HiringServiceError> {
        if self.ports.directory.is_recruiter(user)? {
            Ok(())
        } else {
            Err(HiringServiceError::Authorization {
                user: user.clone(),
                action,
            })
        }
    }
}
