//! API server: builds the router and runs the HTTP and metrics listeners.

use std::net::SocketAddr;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use survey_core::config::AppConfig;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use crate::{responses_rest, session_rest};

/// Every route the server exposes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Surveys and responses
        .route("/surveys/:survey_id", get(rest::get_survey))
        .route("/surveys/:survey_id/questions", get(rest::list_questions))
        .route(
            "/surveys/:survey_id/responses",
            get(rest::list_responses).post(responses_rest::create_responses),
        )
        // Server-rendered sessions
        .route("/surveys/:survey_id/sessions", post(session_rest::start_session))
        .route(
            "/sessions/:session_id",
            get(session_rest::get_session).delete(session_rest::abandon),
        )
        .route("/sessions/:session_id/answer", put(session_rest::record_answer))
        .route("/sessions/:session_id/next", post(session_rest::advance))
        .route("/sessions/:session_id/back", post(session_rest::retreat))
        .route("/sessions/:session_id/submit", post(session_rest::submit))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, surveys = self.state.surveys.len(), "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
