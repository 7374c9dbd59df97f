//! OpenAPI specification served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Survey Express API",
        version = "0.1.0",
        description = "Branching survey delivery.\n\nServes question feeds, accepts batched response submissions with per-item error reporting, and hosts server-rendered respondent sessions.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Surveys", description = "Survey metadata and question feeds"),
        (name = "Responses", description = "Batched response submission and stored rows"),
        (name = "Sessions", description = "Server-rendered respondent traversal"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Surveys
        crate::rest::get_survey,
        crate::rest::list_questions,
        // Responses
        crate::rest::list_responses,
        crate::responses_rest::create_responses,
        // Sessions
        crate::session_rest::start_session,
        crate::session_rest::get_session,
        crate::session_rest::record_answer,
        crate::session_rest::advance,
        crate::session_rest::retreat,
        crate::session_rest::submit,
        crate::session_rest::abandon,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Survey model
        survey_core::Survey,
        survey_core::Question,
        survey_core::QuestionType,
        survey_core::AnswerValue,
        // Wire format
        survey_core::wire::ResponseEnvelope,
        survey_core::wire::ResponsePayload,
        survey_core::wire::QuestionResponseAttributes,
        survey_core::wire::QuestionRef,
        survey_core::wire::ItemContent,
        survey_core::wire::BatchReply,
        crate::responses_rest::SingleResponseReply,
        crate::store::StoredResponse,
        // Sessions
        crate::session_rest::StartSessionRequest,
        crate::session_rest::AnswerRequest,
        crate::session_rest::NextRequest,
        crate::session_rest::SessionView,
        crate::session_rest::ValidationErrors,
        // REST error/health types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
