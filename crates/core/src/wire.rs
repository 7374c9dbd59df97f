//! Submission wire format between the respondent client and the response
//! endpoint (`POST /surveys/{survey_id}/responses`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::types::{AnswerValue, QuestionId, SurveyId};

/// Request body root: `{ "response": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResponseEnvelope {
    pub response: ResponsePayload,
}

/// One completed traversal, or a single answer when the batch list is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResponsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<SurveyId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub question_responses_attributes: Vec<QuestionResponseAttributes>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Single-response form only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionRef>,
    /// Single-response form only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
}

/// One (question, answer) pair of a batch.
///
/// Decoding never fails: a malformed item keeps its raw parts so that it can
/// be rejected on its own while the rest of the batch is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuestionResponseAttributes {
    pub question_id: QuestionRef,
    pub content: ItemContent,
}

impl<'de> Deserialize<'de> for QuestionResponseAttributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let field = |name: &str| raw.get(name).cloned().unwrap_or(Value::Null);
        Ok(Self {
            question_id: QuestionRef::from_value(field("question_id")),
            content: ItemContent::from_value(field("content")),
        })
    }
}

/// A question reference as sent by clients: a number, its text form, or
/// anything else a client put there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum QuestionRef {
    Id(QuestionId),
    Text(String),
    Other(Value),
}

impl QuestionRef {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(id) => QuestionRef::Id(id),
                None => QuestionRef::Other(Value::Number(n)),
            },
            Value::String(text) => QuestionRef::Text(text),
            other => QuestionRef::Other(other),
        }
    }

    /// The numeric id, if the reference is one.
    pub fn resolve(&self) -> Option<QuestionId> {
        match self {
            QuestionRef::Id(id) => Some(*id),
            QuestionRef::Text(text) => text.trim().parse().ok(),
            QuestionRef::Other(_) => None,
        }
    }
}

impl std::fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionRef::Id(id) => write!(f, "{id}"),
            QuestionRef::Text(text) => f.write_str(text),
            QuestionRef::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<QuestionId> for QuestionRef {
    fn from(id: QuestionId) -> Self {
        QuestionRef::Id(id)
    }
}

/// Item content as received: a well-formed answer, or the raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ItemContent {
    Answer(AnswerValue),
    Raw(Value),
}

impl ItemContent {
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<AnswerValue>(value.clone()) {
            Ok(answer) => ItemContent::Answer(answer),
            Err(_) => ItemContent::Raw(value),
        }
    }

    /// The answer this content stands for. Scalars coerce to their text the
    /// way a string column would; `null` is an empty answer. Objects, and
    /// lists holding anything but scalars, have no answer form.
    pub fn to_answer(&self) -> Option<AnswerValue> {
        match self {
            ItemContent::Answer(answer) => Some(answer.clone()),
            ItemContent::Raw(Value::Array(items)) => items
                .iter()
                .map(scalar_text)
                .collect::<Option<Vec<_>>>()
                .map(AnswerValue::Multiple),
            ItemContent::Raw(other) => scalar_text(other).map(AnswerValue::Single),
        }
    }
}

impl From<AnswerValue> for ItemContent {
    fn from(answer: AnswerValue) -> Self {
        ItemContent::Answer(answer)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Batch outcome body: `{ "success": true, "created": n }` (201) or
/// `{ "success": false, "errors": [...] }` (422).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl BatchReply {
    pub fn created(count: usize) -> Self {
        Self {
            success: true,
            created: Some(count),
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            created: None,
            errors,
        }
    }
}
