//! Per-item batch persistence with aggregated failure reporting.
//!
//! Items are written independently and in order. A failing item never rolls
//! back the others; every outcome is collected and reduced into one report.

use std::sync::Arc;

use survey_core::wire::{BatchReply, QuestionResponseAttributes, QuestionRef, ResponsePayload};
use survey_core::{AnswerValue, SurveyId};
use tracing::{info, warn};

use crate::store::{NewResponse, PersistenceError, ResponseStore, StoredResponse};

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success(StoredResponse),
    Failure(String),
}

/// Reduced outcomes of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub created: Vec<StoredResponse>,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_reply(self) -> BatchReply {
        if self.is_success() {
            BatchReply::created(self.created.len())
        } else {
            BatchReply::failed(self.errors)
        }
    }
}

impl FromIterator<ItemOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut report = BatchReport::default();
        for outcome in iter {
            match outcome {
                ItemOutcome::Success(row) => report.created.push(row),
                ItemOutcome::Failure(reason) => report.errors.push(reason),
            }
        }
        report
    }
}

#[derive(Clone)]
pub struct BatchPersistenceHandler {
    store: Arc<dyn ResponseStore>,
}

impl BatchPersistenceHandler {
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self { store }
    }

    /// Persists every item of a batch payload for `survey_id`.
    pub fn persist(&self, survey_id: SurveyId, payload: &ResponsePayload) -> BatchReport {
        let report: BatchReport = payload
            .question_responses_attributes
            .iter()
            .map(|item| self.persist_item(survey_id, item, payload))
            .collect();

        if report.is_success() {
            info!(survey_id, created = report.created.len(), "Batch persisted");
        } else {
            warn!(
                survey_id,
                created = report.created.len(),
                failed = report.errors.len(),
                "Batch persisted with failures"
            );
        }
        report
    }

    /// The single-response form: `question_id` and `value` at the payload root.
    pub fn persist_single(&self, survey_id: SurveyId, payload: &ResponsePayload) -> ItemOutcome {
        let question = payload
            .question_id
            .clone()
            .unwrap_or_else(|| QuestionRef::Text(String::new()));
        let value = payload
            .value
            .as_ref()
            .map(AnswerValue::to_storage_string)
            .unwrap_or_default();
        self.write(survey_id, question, value, payload)
    }

    fn persist_item(
        &self,
        survey_id: SurveyId,
        item: &QuestionResponseAttributes,
        payload: &ResponsePayload,
    ) -> ItemOutcome {
        match item.content.to_answer() {
            Some(answer) => self.write(
                survey_id,
                item.question_id.clone(),
                answer.to_storage_string(),
                payload,
            ),
            None => {
                let error = PersistenceError::ValueInvalid;
                warn!(survey_id, question = %item.question_id, error = %error, "Response item rejected");
                ItemOutcome::Failure(error.to_string())
            }
        }
    }

    fn write(
        &self,
        survey_id: SurveyId,
        question: QuestionRef,
        value: String,
        payload: &ResponsePayload,
    ) -> ItemOutcome {
        let label = question.to_string();
        let row = NewResponse {
            survey_id,
            question,
            value,
            branch: payload.branch.clone(),
            session_id: payload.session_id.clone(),
        };
        match self.store.create(row) {
            Ok(stored) => ItemOutcome::Success(stored),
            Err(e) => {
                warn!(survey_id, question = %label, error = %e, "Response item rejected");
                ItemOutcome::Failure(e.to_string())
            }
        }
    }
}
