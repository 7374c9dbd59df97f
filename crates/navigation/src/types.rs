use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use survey_core::{AnswerValue, QuestionId, SurveyId};
use thiserror::Error;
use uuid::Uuid;

/// Message shown when Next is pressed on an unanswered required question.
pub const REQUIRED_MESSAGE: &str = "Please answer the required question before continuing.";

/// Message shown when submit finds a visited required question unanswered.
pub const INCOMPLETE_MESSAGE: &str = "Please answer all required questions.";

/// Coarse lifecycle of a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPhase {
    Active,
    Finished,
}

/// Explicit traversal state for one respondent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    /// `None` once finished.
    pub current: Option<QuestionId>,
    /// Visited question ids; the first entry is the survey's entry question.
    pub history: Vec<QuestionId>,
    /// Index of `current` within `history`; `history.len()` while finished.
    pub cursor: usize,
    pub finished: bool,
    /// Never pruned on branch changes.
    pub answers: BTreeMap<QuestionId, AnswerValue>,
}

impl NavigationState {
    pub fn phase(&self) -> NavigationPhase {
        if self.finished {
            NavigationPhase::Finished
        } else {
            NavigationPhase::Active
        }
    }

    pub fn answer(&self, id: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&id)
    }
}

/// Result of a successful Advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StepOutcome {
    Moved { to: QuestionId },
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Please answer the required question before continuing.")]
    RequiredUnanswered { question_id: QuestionId },

    #[error("Please answer all required questions.")]
    IncompleteSubmission { missing: Vec<QuestionId> },

    #[error("The survey is finished; there is no current question")]
    NotActive,

    #[error("The survey is not finished yet")]
    NotFinished,

    #[error("Submit is not available until the finished screen has been shown")]
    SubmitNotReady,

    #[error("Question {0} is not part of this survey")]
    UnknownQuestion(QuestionId),

    #[error("Survey {0} not found")]
    UnknownSurvey(SurveyId),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Session limit of {0} reached")]
    SessionLimit(usize),

    #[error("A submission for this session is already in progress")]
    SubmissionInProgress,
}

impl NavigationError {
    /// Validation failures are shown to the respondent; the rest are caller errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            NavigationError::RequiredUnanswered { .. } | NavigationError::IncompleteSubmission { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_generic() {
        let err = NavigationError::RequiredUnanswered { question_id: 4 };
        assert_eq!(err.to_string(), REQUIRED_MESSAGE);
        assert!(err.is_validation());

        let err = NavigationError::IncompleteSubmission { missing: vec![1, 2] };
        assert_eq!(err.to_string(), INCOMPLETE_MESSAGE);
        assert!(!NavigationError::NotActive.is_validation());
    }
}
