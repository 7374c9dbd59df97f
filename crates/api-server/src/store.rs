//! Response persistence. The in-memory store stands in for a relational
//! table with a scalar `value` column.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use survey_core::wire::QuestionRef;
use survey_core::{QuestionId, SurveyId};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::repository::SurveyRepository;

/// Why a single response row could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Validation failed: Question must exist")]
    QuestionMissing,

    #[error("Validation failed: Survey must exist")]
    SurveyMissing,

    #[error("Validation failed: Value is invalid")]
    ValueInvalid,
}

/// A row to insert. `value` is already flattened to its scalar form.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub survey_id: SurveyId,
    pub question: QuestionRef,
    pub value: String,
    pub branch: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredResponse {
    pub id: u64,
    pub survey_id: SurveyId,
    pub question_id: QuestionId,
    pub value: String,
    pub branch: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub trait ResponseStore: Send + Sync {
    fn create(&self, response: NewResponse) -> Result<StoredResponse, PersistenceError>;

    /// Rows for one survey, oldest first.
    fn list(&self, survey_id: SurveyId) -> Vec<StoredResponse>;
}

/// DashMap-backed store that checks question membership like a foreign key.
pub struct InMemoryResponseStore {
    surveys: Arc<SurveyRepository>,
    rows: DashMap<u64, StoredResponse>,
    next_id: AtomicU64,
}

impl InMemoryResponseStore {
    pub fn new(surveys: Arc<SurveyRepository>) -> Self {
        Self {
            surveys,
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ResponseStore for InMemoryResponseStore {
    fn create(&self, response: NewResponse) -> Result<StoredResponse, PersistenceError> {
        let questionnaire = self
            .surveys
            .get(response.survey_id)
            .ok_or(PersistenceError::SurveyMissing)?;
        let question_id = response
            .question
            .resolve()
            .filter(|id| questionnaire.contains(*id))
            .ok_or(PersistenceError::QuestionMissing)?;

        let row = StoredResponse {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            survey_id: response.survey_id,
            question_id,
            value: response.value,
            branch: response.branch,
            session_id: response.session_id,
            created_at: Utc::now(),
        };
        debug!(row_id = row.id, survey_id = row.survey_id, question_id, "Response stored");
        self.rows.insert(row.id, row.clone());
        Ok(row)
    }

    fn list(&self, survey_id: SurveyId) -> Vec<StoredResponse> {
        let mut rows: Vec<StoredResponse> = self
            .rows
            .iter()
            .filter(|r| r.value().survey_id == survey_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }
}
