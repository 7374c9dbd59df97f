use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use survey_core::wire::{QuestionResponseAttributes, ResponseEnvelope, ResponsePayload};
use survey_core::{AnswerValue, QuestionId, SurveyId};
use tracing::debug;

/// One answered question in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionItem {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

/// Every collected answer of one completed traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub survey_id: SurveyId,
    pub items: Vec<SubmissionItem>,
    pub branch: Option<String>,
    pub session_id: Option<String>,
}

impl BatchSubmission {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `POST /surveys/{survey_id}/responses` body. List answers stay lists.
    pub fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope {
            response: ResponsePayload {
                survey_id: Some(self.survey_id),
                question_responses_attributes: self
                    .items
                    .iter()
                    .map(|item| QuestionResponseAttributes {
                        question_id: item.question_id.into(),
                        content: item.value.clone().into(),
                    })
                    .collect(),
                branch: self.branch.clone(),
                session_id: self.session_id.clone(),
                ..Default::default()
            },
        }
    }
}

/// Turns the accumulated answer map into a wire batch.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPackager;

impl SubmissionPackager {
    pub fn new() -> Self {
        Self
    }

    /// One item per recorded answer, in question id order. Answers recorded on
    /// a path later abandoned by a branch change are included too.
    pub fn package(
        &self,
        history: &[QuestionId],
        answers: &BTreeMap<QuestionId, AnswerValue>,
        survey_id: SurveyId,
        session_id: Option<String>,
        branch: Option<String>,
    ) -> BatchSubmission {
        let items: Vec<SubmissionItem> = answers
            .iter()
            .map(|(id, value)| SubmissionItem {
                question_id: *id,
                value: value.clone(),
            })
            .collect();

        let off_path = items
            .iter()
            .filter(|item| !history.contains(&item.question_id))
            .count();
        debug!(
            survey_id,
            items = items.len(),
            off_path,
            "Packaged submission"
        );

        BatchSubmission {
            survey_id,
            items,
            branch,
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::wire::QuestionRef;

    #[test]
    fn one_item_per_answer_including_off_path() {
        let mut answers = BTreeMap::new();
        answers.insert(3, AnswerValue::from("later"));
        answers.insert(1, AnswerValue::from(vec!["A", "B"]));
        answers.insert(2, AnswerValue::from("abandoned branch"));

        let batch = SubmissionPackager::new().package(&[1, 3], &answers, 9, Some("s-1".into()), None);

        assert_eq!(batch.len(), 3);
        let ids: Vec<_> = batch.items.iter().map(|i| i.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(batch.items[0].value, AnswerValue::from(vec!["A", "B"]));
        assert_eq!(batch.session_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn envelope_keeps_lists_as_lists() {
        let mut answers = BTreeMap::new();
        answers.insert(1, AnswerValue::from(vec!["Rust"]));
        let batch = SubmissionPackager::new().package(&[1], &answers, 4, None, Some("Data Engineer".into()));
        let envelope = batch.to_envelope();

        assert_eq!(envelope.response.survey_id, Some(4));
        assert_eq!(envelope.response.branch.as_deref(), Some("Data Engineer"));
        let item = &envelope.response.question_responses_attributes[0];
        assert_eq!(item.question_id, QuestionRef::Id(1));
        assert_eq!(item.content.to_answer(), Some(AnswerValue::Multiple(vec!["Rust".into()])));
    }

    #[test]
    fn empty_answers_make_empty_batch() {
        let batch = SubmissionPackager::new().package(&[], &BTreeMap::new(), 1, None, None);
        assert!(batch.is_empty());
    }
}
