//! Shared REST state, survey read endpoints and operational probes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use survey_core::event_bus::{EventSink, TracingSink};
use survey_core::{Question, Survey, SurveyId};
use survey_navigation::SessionEngine;
use utoipa::ToSchema;

use crate::batch::BatchPersistenceHandler;
use crate::repository::SurveyRepository;
use crate::store::{InMemoryResponseStore, ResponseStore, StoredResponse};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub surveys: Arc<SurveyRepository>,
    pub responses: Arc<dyn ResponseStore>,
    pub batches: BatchPersistenceHandler,
    pub sessions: SessionEngine,
    pub event_sink: Arc<dyn EventSink>,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the in-memory response store and a session engine around `surveys`.
    pub fn new(node_id: impl Into<String>, surveys: Arc<SurveyRepository>, max_sessions: usize) -> Self {
        let node_id = node_id.into();
        let sink = Arc::new(TracingSink::new(node_id.clone()));
        Self::with_event_sink(node_id, surveys, max_sessions, sink)
    }

    pub fn with_event_sink(
        node_id: impl Into<String>,
        surveys: Arc<SurveyRepository>,
        max_sessions: usize,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        let responses: Arc<dyn ResponseStore> = Arc::new(InMemoryResponseStore::new(surveys.clone()));
        Self {
            batches: BatchPersistenceHandler::new(responses.clone()),
            sessions: SessionEngine::new(max_sessions).with_event_sink(event_sink.clone()),
            surveys,
            responses,
            event_sink,
            node_id: node_id.into(),
            start_time: Instant::now(),
        }
    }

    /// Evict server-rendered sessions left idle for `idle_ttl`.
    pub fn with_session_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.sessions = self.sessions.with_idle_ttl(idle_ttl);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn survey_not_found(survey_id: SurveyId) -> (StatusCode, Json<ErrorResponse>) {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "survey_not_found".to_string(),
                message: format!("Survey {survey_id} not found"),
            }),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub surveys: usize,
    pub active_sessions: usize,
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        surveys: state.surveys.len(),
        active_sessions: state.sessions.len(),
    })
}

/// GET /ready: Ready once at least one survey is loaded.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to serve respondents"),
        (status = 503, description = "No surveys loaded"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.surveys.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /surveys/:survey_id: Survey metadata.
#[utoipa::path(
    get,
    path = "/surveys/{survey_id}",
    tag = "Surveys",
    params(("survey_id" = i64, Path, description = "Survey id")),
    responses(
        (status = 200, description = "Survey metadata", body = Survey),
        (status = 404, description = "Unknown survey", body = ErrorResponse),
    )
)]
pub async fn get_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<SurveyId>,
) -> Result<Json<Survey>, (StatusCode, Json<ErrorResponse>)> {
    state
        .surveys
        .get(survey_id)
        .map(|q| Json(q.survey().clone()))
        .ok_or_else(|| ErrorResponse::survey_not_found(survey_id))
}

/// GET /surveys/:survey_id/questions: The question feed, in position order.
#[utoipa::path(
    get,
    path = "/surveys/{survey_id}/questions",
    tag = "Surveys",
    params(("survey_id" = i64, Path, description = "Survey id")),
    responses(
        (status = 200, description = "Questions with JSON-encoded branch mappings", body = [Question]),
        (status = 404, description = "Unknown survey", body = ErrorResponse),
    )
)]
pub async fn list_questions(
    State(state): State<AppState>,
    Path(survey_id): Path<SurveyId>,
) -> Result<Json<Vec<Question>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .surveys
        .get(survey_id)
        .map(|q| Json(q.questions().to_vec()))
        .ok_or_else(|| ErrorResponse::survey_not_found(survey_id))
}

/// GET /surveys/:survey_id/responses: Stored response rows.
#[utoipa::path(
    get,
    path = "/surveys/{survey_id}/responses",
    tag = "Responses",
    params(("survey_id" = i64, Path, description = "Survey id")),
    responses(
        (status = 200, description = "Stored responses, oldest first", body = [StoredResponse]),
        (status = 404, description = "Unknown survey", body = ErrorResponse),
    )
)]
pub async fn list_responses(
    State(state): State<AppState>,
    Path(survey_id): Path<SurveyId>,
) -> Result<Json<Vec<StoredResponse>>, (StatusCode, Json<ErrorResponse>)> {
    if state.surveys.get(survey_id).is_none() {
        return Err(ErrorResponse::survey_not_found(survey_id));
    }
    Ok(Json(state.responses.list(survey_id)))
}
