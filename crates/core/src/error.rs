use thiserror::Error;

use crate::types::{QuestionId, SurveyId};

pub type SurveyResult<T> = Result<T, SurveyError>;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("Survey {survey_id} has more than one question at position {position}")]
    DuplicatePosition { survey_id: SurveyId, position: i32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
