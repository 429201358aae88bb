use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::authoring::{FlowService, NewFlow};
use super::domain::{ApplicantId, Condition, FlowId, StageId, UserId};
use super::graph::{StageDraft, StagePatch};
use super::repository::RepositoryError;
use super::service::{HiringServiceError, ProgressionService, Registration};
use super::submission::{FormDefinition, SubmissionPayload, TestDefinition};

/// Header carrying the caller's user-directory identity.
pub const USER_HEADER: &str = "x-user-id";

/// Shared state for the hiring endpoints.
#[derive(Clone)]
pub struct HiringState {
    pub flows: Arc<FlowService>,
    pub progression: Arc<ProgressionService>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Activation {
    active: bool,
}

/// Router builder exposing flow authoring and applicant progression endpoints.
pub fn hiring_router(state: HiringState) -> Router {
    Router::new()
        .route("/api/v1/flows", post(create_flow_handler))
        .route("/api/v1/flows/{flow_id}", get(flow_handler))
        .route("/api/v1/flows/{flow_id}/stages", post(add_stage_handler))
        .route(
            "/api/v1/flows/{flow_id}/stages/{stage_id}",
            patch(update_stage_handler).delete(remove_stage_handler),
        )
        .route("/api/v1/flows/{flow_id}/conditions", post(add_condition_handler))
        .route(
            "/api/v1/flows/{flow_id}/conditions/{from_stage_id}",
            delete(remove_condition_handler),
        )
        .route("/api/v1/flows/{flow_id}/active", put(activation_handler))
        .route(
            "/api/v1/flows/{flow_id}/applicants",
            post(register_handler).get(list_applicants_handler),
        )
        .route("/api/v1/forms", post(define_form_handler))
        .route("/api/v1/tests", post(define_test_handler))
        .route("/api/v1/applicants/{applicant_id}", get(applicant_handler))
        .route(
            "/api/v1/applicants/{applicant_id}/stages/{stage_id}/submission",
            post(submit_handler),
        )
        .route(
            "/api/v1/applicants/{applicant_id}/advance",
            post(advance_handler),
        )
        .with_state(state)
}

impl HiringServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HiringServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            HiringServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            HiringServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HiringServiceError::Authorization { .. } => StatusCode::FORBIDDEN,
            HiringServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            HiringServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            HiringServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HiringServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = json!({
            "error": self.to_string(),
        });
        (status, axum::Json(payload)).into_response()
    }
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, HiringServiceError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::error!(error = %err, "hiring request failed");
            }
            err.into_response()
        }
    }
}

fn caller(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
}

fn required_caller(
    headers: &HeaderMap,
    action: &'static str,
) -> Result<UserId, HiringServiceError> {
    caller(headers).ok_or_else(|| HiringServiceError::Authorization {
        user: UserId::from("anonymous"),
        action,
    })
}

pub(crate) async fn create_flow_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    axum::Json(new_flow): axum::Json<NewFlow>,
) -> Response {
    let result = required_caller(&headers, "create flows")
        .and_then(|user| state.flows.create_flow(&user, new_flow));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn flow_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(flow_id): Path<String>,
) -> Response {
    let result = required_caller(&headers, "view flows")
        .and_then(|user| state.flows.flow(&user, &FlowId(flow_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_stage_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(flow_id): Path<String>,
    axum::Json(draft): axum::Json<StageDraft>,
) -> Response {
    let result = required_caller(&headers, "edit flows")
        .and_then(|user| state.flows.add_stage(&user, &FlowId(flow_id), draft));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn update_stage_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path((flow_id, stage_id)): Path<(String, String)>,
    axum::Json(stage_patch): axum::Json<StagePatch>,
) -> Response {
    let result = required_caller(&headers, "edit flows").and_then(|user| {
        state
            .flows
            .update_stage(&user, &FlowId(flow_id), &StageId(stage_id), stage_patch)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn remove_stage_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path((flow_id, stage_id)): Path<(String, String)>,
) -> Response {
    let result = required_caller(&headers, "edit flows").and_then(|user| {
        state
            .flows
            .remove_stage(&user, &FlowId(flow_id), &StageId(stage_id))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_condition_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(flow_id): Path<String>,
    axum::Json(condition): axum::Json<Condition>,
) -> Response {
    let result = required_caller(&headers, "edit flows")
        .and_then(|user| state.flows.add_condition(&user, &FlowId(flow_id), condition));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn remove_condition_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path((flow_id, from_stage_id)): Path<(String, String)>,
) -> Response {
    let result = required_caller(&headers, "edit flows").and_then(|user| {
        state
            .flows
            .remove_condition(&user, &FlowId(flow_id), &StageId(from_stage_id))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn activation_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(flow_id): Path<String>,
    axum::Json(activation): axum::Json<Activation>,
) -> Response {
    let result = required_caller(&headers, "change flow activation")
        .and_then(|user| state.flows.set_active(&user, &FlowId(flow_id), activation.active));
    respond(StatusCode::OK, result)
}

pub(crate) async fn define_form_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    axum::Json(form): axum::Json<FormDefinition>,
) -> Response {
    let result = required_caller(&headers, "define forms")
        .and_then(|user| state.flows.define_form(&user, form));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn define_test_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    axum::Json(test): axum::Json<TestDefinition>,
) -> Response {
    let result = required_caller(&headers, "define tests")
        .and_then(|user| state.flows.define_test(&user, test));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn register_handler(
    State(state): State<HiringState>,
    Path(flow_id): Path<String>,
    axum::Json(registration): axum::Json<Registration>,
) -> Response {
    let result = state
        .progression
        .register_applicant(&FlowId(flow_id), registration, Utc::now());
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_applicants_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(flow_id): Path<String>,
) -> Response {
    let result = required_caller(&headers, "list applicants")
        .and_then(|user| state.progression.applicants_for_flow(&user, &FlowId(flow_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn applicant_handler(
    State(state): State<HiringState>,
    Path(applicant_id): Path<String>,
) -> Response {
    let result = state.progression.applicant(&ApplicantId(applicant_id));
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path((applicant_id, stage_id)): Path<(String, String)>,
    axum::Json(payload): axum::Json<SubmissionPayload>,
) -> Response {
    let actor = caller(&headers);
    let result = state.progression.submit_stage(
        actor.as_ref(),
        &ApplicantId(applicant_id),
        &StageId(stage_id),
        payload,
        Utc::now(),
    );
    respond(StatusCode::OK, result)
}

pub(crate) async fn advance_handler(
    State(state): State<HiringState>,
    headers: HeaderMap,
    Path(applicant_id): Path<String>,
) -> Response {
    let result = required_caller(&headers, "advance applicants")
        .and_then(|user| state.progression.advance(&user, &ApplicantId(applicant_id)));
    respond(StatusCode::OK, result)
}
