//! One respondent's traversal: the state machine plus the session-scoped
//! metadata that travels with the final batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use survey_core::{AnswerValue, Question, QuestionId, Questionnaire, SurveyId};
use uuid::Uuid;

use crate::packager::{BatchSubmission, SubmissionPackager};
use crate::state_machine::NavigationStateMachine;
use crate::types::{NavigationError, NavigationState, StepOutcome};
use crate::validation::ValidationGate;

#[derive(Debug, Clone)]
pub struct NavigationSession {
    id: Uuid,
    branch: Option<String>,
    started_at: DateTime<Utc>,
    last_touched: DateTime<Utc>,
    submitting: bool,
    machine: NavigationStateMachine,
}

impl NavigationSession {
    pub fn new(questionnaire: Arc<Questionnaire>, branch: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            branch,
            started_at: now,
            last_touched: now,
            submitting: false,
            machine: NavigationStateMachine::new(questionnaire),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn survey_id(&self) -> SurveyId {
        self.machine.questionnaire().survey().id
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        self.machine.questionnaire()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Marks the respondent as active now.
    pub fn touch(&mut self) {
        self.last_touched = Utc::now();
    }

    /// Time since the respondent last interacted, as of `now`.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_touched).to_std().unwrap_or_default()
    }

    /// A batch built by [`NavigationSession::begin_submission`] is in flight.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn state(&self) -> &NavigationState {
        self.machine.state()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.machine.current_question()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_finished()
    }

    pub fn record_answer(&mut self, question_id: QuestionId, value: AnswerValue) -> Result<(), NavigationError> {
        self.machine.record_answer(question_id, value)
    }

    pub fn advance(&mut self, explicit: Option<AnswerValue>) -> Result<StepOutcome, NavigationError> {
        self.machine.advance(explicit)
    }

    pub fn retreat(&mut self) -> Option<QuestionId> {
        self.machine.retreat()
    }

    pub fn can_retreat(&self) -> bool {
        self.machine.can_retreat()
    }

    pub fn settle(&mut self) {
        self.machine.settle()
    }

    pub fn is_submit_armed(&self) -> bool {
        self.machine.is_submit_armed()
    }

    /// Whether Next would pass the per-step gate right now.
    pub fn can_advance(&self) -> bool {
        match self.current_question() {
            Some(question) => ValidationGate::new()
                .can_advance(question, self.state().answer(question.id))
                .is_ok(),
            None => false,
        }
    }

    /// Runs the submit-time audit and builds the batch. Nothing is sent.
    pub fn prepare_submission(&self) -> Result<BatchSubmission, NavigationError> {
        if !self.is_finished() {
            return Err(NavigationError::NotFinished);
        }
        if !self.is_submit_armed() {
            return Err(NavigationError::SubmitNotReady);
        }

        let state = self.state();
        ValidationGate::new().can_submit(self.questionnaire(), &state.history, &state.answers)?;

        Ok(SubmissionPackager::new().package(
            &state.history,
            &state.answers,
            self.survey_id(),
            Some(self.id.to_string()),
            self.branch.clone(),
        ))
    }

    /// Claims the session for one submission and builds its batch. A second
    /// claim is refused until [`NavigationSession::end_submission`].
    pub fn begin_submission(&mut self) -> Result<BatchSubmission, NavigationError> {
        if self.submitting {
            return Err(NavigationError::SubmissionInProgress);
        }
        let batch = self.prepare_submission()?;
        self.submitting = true;
        Ok(batch)
    }

    pub fn end_submission(&mut self) {
        self.submitting = false;
    }
}
