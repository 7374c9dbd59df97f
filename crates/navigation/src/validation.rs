use std::collections::BTreeMap;

use survey_core::{AnswerValue, Question, QuestionId, Questionnaire};
use tracing::debug;

use crate::types::NavigationError;

/// Decides whether forward progress or submission is permitted.
#[derive(Debug, Clone, Default)]
pub struct ValidationGate;

impl ValidationGate {
    pub fn new() -> Self {
        Self
    }

    /// Per-step check: a required question needs a non-blank answer.
    pub fn can_advance(
        &self,
        question: &Question,
        answer: Option<&AnswerValue>,
    ) -> Result<(), NavigationError> {
        if !question.required {
            return Ok(());
        }
        match answer {
            Some(answer) if !answer.is_blank() => Ok(()),
            _ => {
                debug!(question_id = question.id, "Required question unanswered");
                Err(NavigationError::RequiredUnanswered {
                    question_id: question.id,
                })
            }
        }
    }

    /// Submit-time audit: every visited required question has a non-empty answer.
    pub fn can_submit(
        &self,
        questionnaire: &Questionnaire,
        history: &[QuestionId],
        answers: &BTreeMap<QuestionId, AnswerValue>,
    ) -> Result<(), NavigationError> {
        let mut missing: Vec<QuestionId> = history
            .iter()
            .filter_map(|id| questionnaire.get(*id))
            .filter(|q| q.required)
            .filter(|q| answers.get(&q.id).map_or(true, AnswerValue::is_empty))
            .map(|q| q.id)
            .collect();
        missing.sort_unstable();
        missing.dedup();

        if missing.is_empty() {
            Ok(())
        } else {
            debug!(missing = ?missing, "Submission blocked by unanswered required questions");
            Err(NavigationError::IncompleteSubmission { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::{QuestionType, Survey};

    #[test]
    fn optional_questions_always_pass() {
        let gate = ValidationGate::new();
        let q = Question::new(1, "Tools?", QuestionType::Text, 1);
        assert!(gate.can_advance(&q, None).is_ok());
        assert!(gate.can_advance(&q, Some(&"".into())).is_ok());
    }

    #[test]
    fn required_questions_need_non_blank_answers() {
        let gate = ValidationGate::new();
        let text = Question::new(1, "Name", QuestionType::Text, 1).required();
        assert!(gate.can_advance(&text, None).is_err());
        assert!(gate.can_advance(&text, Some(&"   ".into())).is_err());
        assert!(gate.can_advance(&text, Some(&" Ada ".into())).is_ok());

        let boxes = Question::new(2, "Langs", QuestionType::Checkbox, 2).required();
        assert_eq!(
            gate.can_advance(&boxes, Some(&AnswerValue::Multiple(vec![]))),
            Err(NavigationError::RequiredUnanswered { question_id: 2 })
        );
        assert!(gate.can_advance(&boxes, Some(&vec!["Rust"].into())).is_ok());
    }

    #[test]
    fn submit_audits_only_visited_required_questions() {
        let survey = Survey {
            id: 1,
            title: "t".into(),
            description: String::new(),
            branches: vec![],
        };
        let q = Questionnaire::new(
            survey,
            vec![
                Question::new(1, "a", QuestionType::Rating, 1).required(),
                Question::new(2, "b", QuestionType::Text, 2).required(),
                Question::new(3, "c", QuestionType::Text, 3),
            ],
        )
        .unwrap();
        let gate = ValidationGate::new();

        let mut answers = BTreeMap::new();
        answers.insert(1, AnswerValue::from("4"));

        // Question 2 was never visited.
        assert!(gate.can_submit(&q, &[1, 3], &answers).is_ok());
        assert_eq!(
            gate.can_submit(&q, &[1, 2, 3], &answers),
            Err(NavigationError::IncompleteSubmission { missing: vec![2] })
        );

        answers.insert(2, AnswerValue::from(""));
        assert!(gate.can_submit(&q, &[1, 2], &answers).is_err());
        answers.insert(2, AnswerValue::from("done"));
        assert!(gate.can_submit(&q, &[1, 2], &answers).is_ok());
    }
}
