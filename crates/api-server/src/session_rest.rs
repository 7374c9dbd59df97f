//! Server-rendered respondent sessions. Every endpoint answers with the
//! screen the respondent should see next.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use survey_core::wire::BatchReply;
use survey_core::{AnswerValue, QuestionId, SurveyId};
use survey_navigation::{NavigationError, Screen};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::responses_rest::record_outcome;
use crate::rest::{AppState, ErrorResponse};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Branch path marker carried into the submitted batch.
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NextRequest {
    /// Answer for the current question; the recorded answer is used when absent.
    #[serde(default)]
    pub value: Option<AnswerValue>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub session_id: Uuid,
    #[schema(value_type = Object)]
    pub screen: Screen,
}

/// `{ "errors": [...] }`, the body of every 422 from these endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrors {
    pub errors: Vec<String>,
}

fn error_response(err: NavigationError) -> Response {
    if err.is_validation() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrors {
                errors: vec![err.to_string()],
            }),
        )
            .into_response();
    }

    let (status, code) = match &err {
        NavigationError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
        NavigationError::UnknownSurvey(_) => (StatusCode::NOT_FOUND, "survey_not_found"),
        NavigationError::UnknownQuestion(_) => (StatusCode::BAD_REQUEST, "unknown_question"),
        NavigationError::SessionLimit(_) => (StatusCode::SERVICE_UNAVAILABLE, "session_limit"),
        NavigationError::SubmissionInProgress => (StatusCode::CONFLICT, "submission_in_progress"),
        _ => (StatusCode::CONFLICT, "invalid_state"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

fn view(state: &AppState, session_id: Uuid) -> Result<Json<SessionView>, Response> {
    let screen = state.sessions.screen(&session_id).map_err(error_response)?;
    Ok(Json(SessionView { session_id, screen }))
}

/// POST /surveys/:survey_id/sessions: Start a traversal.
#[utoipa::path(
    post,
    path = "/surveys/{survey_id}/sessions",
    tag = "Sessions",
    params(("survey_id" = i64, Path, description = "Survey id")),
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionView),
        (status = 404, description = "Unknown survey", body = ErrorResponse),
    )
)]
pub async fn start_session(
    State(state): State<AppState>,
    Path(survey_id): Path<SurveyId>,
    request: Option<Json<StartSessionRequest>>,
) -> Result<(StatusCode, Json<SessionView>), Response> {
    let questionnaire = state
        .surveys
        .get(survey_id)
        .ok_or_else(|| error_response(NavigationError::UnknownSurvey(survey_id)))?;
    let branch = request.and_then(|Json(r)| r.branch);

    let session_id = state
        .sessions
        .start_session(questionnaire, branch)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, view(&state, session_id)?))
}

/// GET /sessions/:session_id: Current screen.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current screen", body = SessionView),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, Response> {
    view(&state, session_id)
}

/// PUT /sessions/:session_id/answer: Record an answer without moving.
#[utoipa::path(
    put,
    path = "/sessions/{session_id}/answer",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SessionView),
        (status = 400, description = "Question not in this survey", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
pub async fn record_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<SessionView>, Response> {
    state
        .sessions
        .record_answer(&session_id, request.question_id, request.value)
        .map_err(error_response)?;
    view(&state, session_id)
}

/// POST /sessions/:session_id/next: Advance past the current question.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/next",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    request_body = NextRequest,
    responses(
        (status = 200, description = "Moved or finished", body = SessionView),
        (status = 422, description = "Required question unanswered", body = ValidationErrors),
        (status = 409, description = "Session already finished", body = ErrorResponse),
    )
)]
pub async fn advance(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    request: Option<Json<NextRequest>>,
) -> Result<Json<SessionView>, Response> {
    let explicit = request.and_then(|Json(r)| r.value);
    state
        .sessions
        .advance(&session_id, explicit)
        .map_err(error_response)?;
    view(&state, session_id)
}

/// POST /sessions/:session_id/back: Return to the previous question.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/back",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Moved back, or unchanged at the first question", body = SessionView),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
pub async fn retreat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, Response> {
    state.sessions.retreat(&session_id).map_err(error_response)?;
    view(&state, session_id)
}

/// POST /sessions/:session_id/submit: Persist the session's answers.
///
/// The session is claimed before anything is written, so a concurrent submit
/// of the same session gets a 409. On success the session is discarded and
/// the summary screen returned. A partially failed batch releases the claim
/// so the respondent can retry.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/submit",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 201, description = "Submitted", body = SessionView),
        (status = 409, description = "Not finished, submit not yet enabled, or already submitting", body = ErrorResponse),
        (status = 422, description = "Required answers missing or items rejected", body = BatchReply),
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionView>), Response> {
    let batch = state
        .sessions
        .claim_submission(&session_id)
        .map_err(error_response)?;

    let payload = batch.to_envelope().response;
    let report = state.batches.persist(batch.survey_id, &payload);
    record_outcome(&state, batch.survey_id, &payload, &report);

    if !report.is_success() {
        warn!(session_id = %session_id, errors = report.errors.len(), "Session submission rejected");
        state
            .sessions
            .release_submission(&session_id)
            .map_err(error_response)?;
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(report.into_reply())).into_response());
    }

    let summary = state.sessions.complete(&session_id).map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionView {
            session_id,
            screen: Screen::Submitted { summary },
        }),
    ))
}

/// DELETE /sessions/:session_id: Abandon without persisting.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
pub async fn abandon(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    state.sessions.abandon(&session_id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
