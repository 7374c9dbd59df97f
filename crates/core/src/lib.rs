//! Survey data model, branch mappings, wire format, configuration and the
//! shared event bus.

pub mod branch;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod questionnaire;
pub mod types;
pub mod wire;

pub use branch::{BranchMapping, BranchTarget};
pub use config::AppConfig;
pub use error::{SurveyError, SurveyResult};
pub use questionnaire::{Questionnaire, SurveyFeed};
pub use types::{AnswerValue, Question, QuestionId, QuestionType, Survey, SurveyId};
