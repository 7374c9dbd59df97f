//! Response submission endpoint.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use survey_core::event_bus::make_event;
use survey_core::types::SurveyEventType;
use survey_core::wire::{BatchReply, ResponseEnvelope, ResponsePayload};
use survey_core::SurveyId;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::batch::{BatchReport, ItemOutcome};
use crate::rest::{AppState, ErrorResponse};

/// Reply of the single-response form: `{ "success": true }` or `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SingleResponseReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /surveys/:survey_id/responses: Persist one completed traversal.
///
/// Each item is written independently. Any failure turns the whole reply into
/// a 422 carrying every item error, while successful items stay persisted.
#[utoipa::path(
    post,
    path = "/surveys/{survey_id}/responses",
    tag = "Responses",
    params(("survey_id" = i64, Path, description = "Survey id")),
    request_body = ResponseEnvelope,
    responses(
        (status = 201, description = "All items persisted", body = BatchReply),
        (status = 404, description = "Unknown survey", body = ErrorResponse),
        (status = 422, description = "One or more items failed", body = BatchReply),
    )
)]
pub async fn create_responses(
    State(state): State<AppState>,
    Path(survey_id): Path<SurveyId>,
    Json(envelope): Json<ResponseEnvelope>,
) -> Response {
    if state.surveys.get(survey_id).is_none() {
        return ErrorResponse::survey_not_found(survey_id).into_response();
    }
    let payload = envelope.response;
    if let Some(body_survey) = payload.survey_id.filter(|id| *id != survey_id) {
        warn!(survey_id, body_survey, "Body survey_id differs from path; using path");
    }

    if payload.question_responses_attributes.is_empty() {
        return create_single(&state, survey_id, &payload).into_response();
    }

    let report = state.batches.persist(survey_id, &payload);
    record_outcome(&state, survey_id, &payload, &report);

    let status = if report.is_success() {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(report.into_reply())).into_response()
}

fn create_single(
    state: &AppState,
    survey_id: SurveyId,
    payload: &ResponsePayload,
) -> (StatusCode, Json<SingleResponseReply>) {
    match state.batches.persist_single(survey_id, payload) {
        ItemOutcome::Success(_) => {
            metrics::counter!("survey.responses.created").increment(1);
            (
                StatusCode::CREATED,
                Json(SingleResponseReply {
                    success: Some(true),
                    error: None,
                }),
            )
        }
        ItemOutcome::Failure(reason) => {
            metrics::counter!("survey.responses.failed").increment(1);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(SingleResponseReply {
                    success: None,
                    error: Some(reason),
                }),
            )
        }
    }
}

/// Metrics and events for a persisted batch.
pub(crate) fn record_outcome(state: &AppState, survey_id: SurveyId, payload: &ResponsePayload, report: &BatchReport) {
    metrics::counter!("survey.responses.created").increment(report.created.len() as u64);
    metrics::counter!("survey.responses.failed").increment(report.errors.len() as u64);

    let event_type = if report.is_success() {
        metrics::counter!("survey.batches.accepted").increment(1);
        SurveyEventType::ResponsesPersisted
    } else {
        metrics::counter!("survey.batches.rejected").increment(1);
        SurveyEventType::ResponsesRejected
    };
    let session_id = payload
        .session_id
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok());
    state
        .event_sink
        .emit(make_event(event_type, survey_id, session_id, None));
}
