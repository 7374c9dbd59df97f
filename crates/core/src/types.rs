use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::branch::BranchMapping;

/// Identifier of a question. Branch targets refer to it by its decimal text form.
pub type QuestionId = i64;

/// Identifier of a survey.
pub type SurveyId = i64;

/// Survey metadata as supplied by the question feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Named audience paths declared by the author. Informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
}

/// The widget kind of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    LongText,
    MultipleChoice,
    Checkbox,
    Rating,
}

/// Choices offered by a rating question.
pub const RATING_SCALE: [&str; 5] = ["1", "2", "3", "4", "5"];

impl QuestionType {
    /// Free-text questions are the only ones that consult the `*` wildcard.
    pub fn is_free_text(&self) -> bool {
        matches!(self, QuestionType::Text | QuestionType::LongText)
    }

    /// Only checkbox questions collect list-valued answers.
    pub fn is_multi_select(&self) -> bool {
        matches!(self, QuestionType::Checkbox)
    }

    /// Selectable values for this type given the author's option list.
    pub fn choices(&self, options: &[String]) -> Vec<String> {
        match self {
            QuestionType::MultipleChoice | QuestionType::Checkbox => options.to_vec(),
            QuestionType::Rating => RATING_SCALE.iter().map(|s| s.to_string()).collect(),
            QuestionType::Text | QuestionType::LongText => Vec::new(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::LongText => "long_text",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Rating => "rating",
        }
    }
}

/// A single survey question as consumed by the navigation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub id: QuestionId,
    pub content: String,
    pub question_type: QuestionType,
    /// Defines the default linear successor. Unique within a survey.
    pub position: i32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    /// JSON-encoded branch mapping on the wire.
    #[serde(default, with = "crate::branch::encoded")]
    #[schema(value_type = Option<String>)]
    pub branch: Option<BranchMapping>,
    /// Audience tag used by authoring tools. The engine ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl Question {
    pub fn new(id: QuestionId, content: impl Into<String>, question_type: QuestionType, position: i32) -> Self {
        Self {
            id,
            content: content.into(),
            question_type,
            position,
            required: false,
            options: Vec::new(),
            branch: None,
            audience: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_branch(mut self, branch: BranchMapping) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Selectable values shown to the respondent.
    pub fn choices(&self) -> Vec<String> {
        self.question_type.choices(&self.options)
    }
}

/// A collected answer: a scalar string, or an ordered list for checkbox questions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    /// Blank for the per-step gate: an empty list, or a string that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Single(s) => s.trim().is_empty(),
            AnswerValue::Multiple(values) => values.is_empty(),
        }
    }

    /// Empty for the submit-time audit: no characters or no selections.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Single(s) => s.is_empty(),
            AnswerValue::Multiple(values) => values.is_empty(),
        }
    }

    /// The branch-mapping keys this answer offers, in answer order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            AnswerValue::Single(s) => vec![s.as_str()],
            AnswerValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Scalar form for storage columns. Lists become their JSON text encoding.
    pub fn to_storage_string(&self) -> String {
        match self {
            AnswerValue::Single(s) => s.clone(),
            AnswerValue::Multiple(values) => serde_json::Value::from(values.clone()).to_string(),
        }
    }

    /// Human-readable form used by submission summaries.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Single(s) => s.clone(),
            AnswerValue::Multiple(values) => values.join(", "),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Single(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Single(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(values: Vec<String>) -> Self {
        AnswerValue::Multiple(values)
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(values: Vec<&str>) -> Self {
        AnswerValue::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

/// Event emitted by the navigation engine and the response handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyEvent {
    pub event_id: Uuid,
    pub event_type: SurveyEventType,
    pub survey_id: SurveyId,
    pub session_id: Option<Uuid>,
    pub question_id: Option<QuestionId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurveyEventType {
    SessionStarted,
    AnswerRecorded,
    QuestionAdvanced,
    QuestionRetreated,
    AdvanceRejected,
    SurveyFinished,
    SubmissionPrepared,
    SessionCompleted,
    SessionAbandoned,
    SessionExpired,
    ResponsesPersisted,
    ResponsesRejected,
}
