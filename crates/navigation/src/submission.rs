//! Delivery of a completed traversal to the response endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use survey_core::config::ClientConfig;
use survey_core::wire::{BatchReply, ResponseEnvelope};
use survey_core::{QuestionId, SurveyId};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::NavigationSession;
use crate::types::NavigationError;

/// Shown when the server rejects a batch without saying why.
pub const GENERIC_REJECTION: &str = "There was an error submitting your response.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("A submission is already in progress")]
    AlreadySubmitting,

    #[error("Please answer all required questions.")]
    Incomplete { missing: Vec<QuestionId> },

    #[error("{}", .errors.join(", "))]
    Rejected { errors: Vec<String> },

    #[error("There was an error connecting to the server.")]
    Transport(String),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error(transparent)]
    Navigation(NavigationError),
}

impl From<NavigationError> for SubmissionError {
    fn from(err: NavigationError) -> Self {
        match err {
            NavigationError::IncompleteSubmission { missing } => SubmissionError::Incomplete { missing },
            other => SubmissionError::Navigation(other),
        }
    }
}

/// Status and decoded body of a response-endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: Option<BatchReply>,
}

#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(
        &self,
        survey_id: SurveyId,
        envelope: &ResponseEnvelope,
    ) -> Result<TransportReply, SubmissionError>;
}

/// POSTs batches to `{base_url}/surveys/{survey_id}/responses`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn responses_url(&self, survey_id: SurveyId) -> String {
        format!("{}/surveys/{}/responses", self.base_url, survey_id)
    }
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn submit(
        &self,
        survey_id: SurveyId,
        envelope: &ResponseEnvelope,
    ) -> Result<TransportReply, SubmissionError> {
        let response = self
            .client
            .post(self.responses_url(survey_id))
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, survey_id, "Submission transport failed");
                SubmissionError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        // Bodies that are not a batch reply are treated as absent.
        let body = response.json::<BatchReply>().await.ok();
        Ok(TransportReply { status, body })
    }
}

/// What a successful submission produced on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub created: usize,
}

/// Sends finished sessions through a transport, one at a time.
pub struct Submitter<T> {
    transport: T,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: SubmissionTransport> Submitter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Audits, packages and sends the session's answers. Local failures never
    /// reach the transport, and a second call while one is pending is refused.
    pub async fn submit(&self, session: &NavigationSession) -> Result<SubmissionReceipt, SubmissionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmissionError::AlreadySubmitting);
        }
        let _guard = InFlight(&self.in_flight);

        let batch = session.prepare_submission()?;
        let reply = self.transport.submit(batch.survey_id, &batch.to_envelope()).await?;

        match reply.status {
            200..=299 => {
                let created = reply.body.and_then(|b| b.created).unwrap_or(batch.len());
                info!(survey_id = batch.survey_id, created, "Submission accepted");
                Ok(SubmissionReceipt { created })
            }
            422 => {
                let errors = reply
                    .body
                    .map(|b| b.errors)
                    .filter(|errors| !errors.is_empty())
                    .unwrap_or_else(|| vec![GENERIC_REJECTION.to_string()]);
                warn!(survey_id = batch.survey_id, errors = errors.len(), "Submission rejected");
                Err(SubmissionError::Rejected { errors })
            }
            status => {
                warn!(survey_id = batch.survey_id, status, "Unexpected submission status");
                Err(SubmissionError::UnexpectedStatus(status))
            }
        }
    }
}
