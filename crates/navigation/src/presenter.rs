//! View models for whatever renders a session: a terminal, HTML, or JSON.

use serde::{Deserialize, Serialize};
use survey_core::{AnswerValue, QuestionId, QuestionType};

use crate::session::NavigationSession;

/// The current question as a renderer needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub content: String,
    pub question_type: QuestionType,
    pub required: bool,
    pub choices: Vec<String>,
    pub answer: Option<AnswerValue>,
    pub next_enabled: bool,
    pub back_enabled: bool,
}

/// What the respondent should see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Question(QuestionView),
    Finished {
        back_enabled: bool,
        submit_enabled: bool,
        submitting: bool,
    },
    Submitted {
        summary: SubmissionSummary,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub id: QuestionId,
    pub content: String,
    pub question_type: QuestionType,
    pub value: Option<AnswerValue>,
    /// Lists joined with ", "; empty when unanswered.
    pub display: String,
}

/// Visited questions with the answers given, shown after a successful submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub entries: Vec<SummaryEntry>,
}

impl SubmissionSummary {
    pub fn from_session(session: &NavigationSession) -> Self {
        let state = session.state();
        let entries = state
            .history
            .iter()
            .filter_map(|id| session.questionnaire().get(*id))
            .map(|question| {
                let value = state.answer(question.id).cloned();
                SummaryEntry {
                    id: question.id,
                    content: question.content.clone(),
                    question_type: question.question_type,
                    display: value.as_ref().map(AnswerValue::display).unwrap_or_default(),
                    value,
                }
            })
            .collect();
        Self { entries }
    }
}

/// Builds the screen for `session`. `submitting` reflects an in-flight submit.
pub fn render(session: &NavigationSession, submitting: bool) -> Screen {
    let back_enabled = session.can_retreat();
    match session.current_question() {
        Some(question) if !session.is_finished() => Screen::Question(QuestionView {
            id: question.id,
            content: question.content.clone(),
            question_type: question.question_type,
            required: question.required,
            choices: question.choices(),
            answer: session.state().answer(question.id).cloned(),
            next_enabled: session.can_advance(),
            back_enabled,
        }),
        _ => Screen::Finished {
            back_enabled: back_enabled && !submitting,
            submit_enabled: session.is_submit_armed() && !submitting,
            submitting,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use survey_core::{Question, Questionnaire, Survey};

    fn session() -> NavigationSession {
        let survey = Survey {
            id: 1,
            title: "Engineering Team Satisfaction Survey".into(),
            description: String::new(),
            branches: vec![],
        };
        let q = Questionnaire::new(
            survey,
            vec![
                Question::new(1, "Languages?", QuestionType::Checkbox, 1)
                    .required()
                    .with_options(["Rust", "Go", "Ruby"]),
                Question::new(2, "Satisfaction", QuestionType::Rating, 2),
            ],
        )
        .unwrap();
        NavigationSession::new(Arc::new(q), None)
    }

    #[test]
    fn question_screen_reflects_gate() {
        let mut s = session();
        let Screen::Question(view) = render(&s, false) else {
            panic!("expected a question screen");
        };
        assert_eq!(view.choices, vec!["Rust", "Go", "Ruby"]);
        assert!(!view.next_enabled);
        assert!(!view.back_enabled);

        s.record_answer(1, vec!["Rust", "Go"].into()).unwrap();
        let Screen::Question(view) = render(&s, false) else {
            panic!("expected a question screen");
        };
        assert!(view.next_enabled);
    }

    #[test]
    fn finished_screen_and_summary() {
        let mut s = session();
        s.advance(Some(vec!["Rust", "Go"].into())).unwrap();
        s.advance(Some("5".into())).unwrap();

        assert_eq!(
            render(&s, false),
            Screen::Finished { back_enabled: true, submit_enabled: false, submitting: false }
        );
        s.settle();
        assert_eq!(
            render(&s, true),
            Screen::Finished { back_enabled: true, submit_enabled: false, submitting: true }
        );

        let summary = SubmissionSummary::from_session(&s);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].display, "Rust, Go");
        assert_eq!(summary.entries[1].display, "5");
    }

    #[test]
    fn screens_serialize_with_a_tag() {
        let json = serde_json::to_value(render(&session(), false)).unwrap();
        assert_eq!(json["screen"], "question");
        assert_eq!(json["question_type"], "checkbox");
    }
}
