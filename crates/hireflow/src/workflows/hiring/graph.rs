//! Ordered stage lookup and conditional-edge bookkeeping for a flow.
//!
//! Reads are pure. The mutating helpers enforce the authoring rules: edges only join a stage to
//! the stage directly after it, each stage has at most one outgoing edge, and nothing changes
//! while the flow is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ComparableValue, Condition, Flow, Operation, ReferenceId, Stage, StageId, StageType,
};
use super::errors::{NotFound, ValidationError};

pub fn stage_at(flow: &Flow, index: usize) -> Option<&Stage> {
    flow.stages.get(index)
}

pub fn stage_index_of(flow: &Flow, stage_id: &StageId) -> Result<usize, NotFound> {
    flow.stages
        .iter()
        .position(|stage| &stage.id == stage_id)
        .ok_or_else(|| NotFound::Stage(stage_id.clone()))
}

/// The edge leaving `stage_id`; `None` means the flow advances unconditionally.
pub fn outgoing_condition<'a>(flow: &'a Flow, stage_id: &StageId) -> Option<&'a Condition> {
    flow.conditions
        .iter()
        .find(|condition| &condition.from == stage_id)
}

/// Fields supplied when appending a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDraft {
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub reference_id: ReferenceId,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub test_duration: Option<u32>,
}

/// Partial stage update. `stage_type` and `reference_id` may only repeat the current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePatch {
    #[serde(default, rename = "type")]
    pub stage_type: Option<StageType>,
    #[serde(default)]
    pub reference_id: Option<ReferenceId>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub test_duration: Option<u32>,
}

fn ensure_editable(flow: &Flow) -> Result<(), ValidationError> {
    if flow.active {
        Err(ValidationError::FlowActive)
    } else {
        Ok(())
    }
}

fn check_schedule(stage: &Stage) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (stage.start_date, stage.end_date) {
        if start > end {
            return Err(ValidationError::InvalidDateRange);
        }
    }
    match (stage.stage_type, stage.test_duration) {
        (StageType::Test, Some(0)) | (StageType::Form | StageType::Interview, Some(_)) => {
            Err(ValidationError::InvalidTestDuration)
        }
        _ => Ok(()),
    }
}

pub fn append_stage(flow: &mut Flow, draft: StageDraft) -> Result<&Stage, ValidationError> {
    ensure_editable(flow)?;
    let stage = Stage {
        id: StageId::generate(),
        stage_type: draft.stage_type,
        reference_id: draft.reference_id,
        start_date: draft.start_date,
        end_date: draft.end_date,
        test_duration: draft.test_duration,
    };
    check_schedule(&stage)?;
    flow.stages.push(stage);
    Ok(&flow.stages[flow.stages.len() - 1])
}

pub fn update_stage(
    flow: &mut Flow,
    stage_id: &StageId,
    patch: StagePatch,
) -> Result<Stage, UpdateError> {
    ensure_editable(flow)?;
    let index = stage_index_of(flow, stage_id)?;
    let current = &flow.stages[index];

    if patch
        .stage_type
        .is_some_and(|stage_type| stage_type != current.stage_type)
    {
        return Err(ValidationError::ImmutableStageField("type").into());
    }
    if patch
        .reference_id
        .as_ref()
        .is_some_and(|reference| reference != &current.reference_id)
    {
        return Err(ValidationError::ImmutableStageField("referenceID").into());
    }

    let mut updated = current.clone();
    if patch.start_date.is_some() {
        updated.start_date = patch.start_date;
    }
    if patch.end_date.is_some() {
        updated.end_date = patch.end_date;
    }
    if patch.test_duration.is_some() {
        updated.test_duration = patch.test_duration;
    }
    check_schedule(&updated)?;

    flow.stages[index] = updated.clone();
    Ok(updated)
}

/// Remove a stage along with every edge that touches it.
pub fn remove_stage(flow: &mut Flow, stage_id: &StageId) -> Result<Stage, UpdateError> {
    ensure_editable(flow)?;
    let index = stage_index_of(flow, stage_id)?;
    flow.conditions
        .retain(|condition| &condition.from != stage_id && &condition.to != stage_id);
    Ok(flow.stages.remove(index))
}

pub fn add_condition(flow: &mut Flow, condition: Condition) -> Result<(), UpdateError> {
    ensure_editable(flow)?;
    let from = stage_index_of(flow, &condition.from)?;
    let to = stage_index_of(flow, &condition.to)?;

    if to != from + 1 {
        return Err(ValidationError::ConditionNotAdjacent {
            from: condition.from.clone(),
            to: condition.to.clone(),
        }
        .into());
    }
    if outgoing_condition(flow, &condition.from).is_some() {
        return Err(ValidationError::ConditionExists(condition.from.clone()).into());
    }
    check_operand(condition.operation, &condition.value)?;

    flow.conditions.push(condition);
    Ok(())
}

pub fn remove_condition(flow: &mut Flow, from: &StageId) -> Result<Condition, UpdateError> {
    ensure_editable(flow)?;
    let position = flow
        .conditions
        .iter()
        .position(|condition| &condition.from == from)
        .ok_or_else(|| NotFound::Condition(from.clone()))?;
    Ok(flow.conditions.remove(position))
}

fn check_operand(operation: Operation, value: &ComparableValue) -> Result<(), ValidationError> {
    let reason = match (operation, value) {
        (op, ComparableValue::Text(_)) if op.is_relational() => "ordered values against text",
        (op, ComparableValue::FullName { .. }) if op.is_relational() => {
            "ordered values against a name"
        }
        (op, ComparableValue::Selections(_)) if op.is_relational() => {
            "ordered values against selections"
        }
        (Operation::Includes, ComparableValue::Number(_) | ComparableValue::Date(_)) => {
            "containment against a number or date"
        }
        (_, ComparableValue::Number(number)) if !number.is_finite() => "a non-finite number",
        _ => return Ok(()),
    };
    Err(ValidationError::IncompatibleCondition { operation, reason })
}

/// Edit failures: the target may be missing or the edit may break an authoring rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
