//! Validated, position-ordered question set for one survey.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::branch::{BranchTarget, WILDCARD_KEY};
use crate::error::{SurveyError, SurveyResult};
use crate::types::{Question, QuestionId, Survey};

/// The document consumed from a question feed: survey metadata plus its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyFeed {
    pub survey: Survey,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl SurveyFeed {
    pub fn into_questionnaire(self) -> SurveyResult<Questionnaire> {
        Questionnaire::new(self.survey, self.questions)
    }
}

/// Authoring problems found in a survey's branch mappings. Navigation stays
/// lenient about all of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BranchIssue {
    #[error("question {question_id}: target {target:?} for answer {key:?} is neither END nor a question id")]
    UnresolvableTarget {
        question_id: QuestionId,
        key: String,
        target: String,
    },
    #[error("question {question_id}: answer {key:?} routes to question {target_id}, which is not in this survey")]
    UnknownTarget {
        question_id: QuestionId,
        key: String,
        target_id: QuestionId,
    },
    #[error("question {question_id}: wildcard route is only consulted for free-text questions")]
    WildcardIgnored { question_id: QuestionId },
}

/// Questions sorted by position, with id lookup.
#[derive(Debug, Clone)]
pub struct Questionnaire {
    survey: Survey,
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
}

impl Questionnaire {
    /// Validates unique ids and positions and sorts by position.
    pub fn new(survey: Survey, mut questions: Vec<Question>) -> SurveyResult<Self> {
        questions.sort_by_key(|q| q.position);

        let mut index = HashMap::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            if index.insert(question.id, i).is_some() {
                return Err(SurveyError::DuplicateQuestion(question.id));
            }
            if i > 0 && questions[i - 1].position == question.position {
                return Err(SurveyError::DuplicatePosition {
                    survey_id: survey.id,
                    position: question.position,
                });
            }
        }

        Ok(Self {
            survey,
            questions,
            index,
        })
    }

    pub fn survey(&self) -> &Survey {
        &self.survey
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question with the smallest position.
    pub fn entry(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.index.get(&id).map(|&i| &self.questions[i])
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.index.contains_key(&id)
    }

    /// The question whose position is immediately greater than `id`'s.
    pub fn successor_of(&self, id: QuestionId) -> Option<&Question> {
        self.index
            .get(&id)
            .and_then(|&i| self.questions.get(i + 1))
    }

    /// Checks every branch mapping against this survey's questions.
    pub fn lint(&self) -> Vec<BranchIssue> {
        let mut issues = Vec::new();
        for question in &self.questions {
            let Some(mapping) = &question.branch else {
                continue;
            };
            for (key, raw) in mapping.iter() {
                if key == WILDCARD_KEY && !question.question_type.is_free_text() && !raw.trim().is_empty() {
                    issues.push(BranchIssue::WildcardIgnored {
                        question_id: question.id,
                    });
                }
                match BranchTarget::parse(raw) {
                    Some(BranchTarget::Unresolvable { raw }) => {
                        issues.push(BranchIssue::UnresolvableTarget {
                            question_id: question.id,
                            key: key.to_string(),
                            target: raw,
                        });
                    }
                    Some(BranchTarget::Question { id }) if !self.contains(id) => {
                        issues.push(BranchIssue::UnknownTarget {
                            question_id: question.id,
                            key: key.to_string(),
                            target_id: id,
                        });
                    }
                    _ => {}
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchMapping;
    use crate::types::QuestionType;

    fn survey() -> Survey {
        Survey {
            id: 1,
            title: "Engineering Team Satisfaction Survey".into(),
            description: String::new(),
            branches: vec![],
        }
    }

    #[test]
    fn sorts_by_position_and_links_successors() {
        let q = Questionnaire::new(
            survey(),
            vec![
                Question::new(30, "third", QuestionType::Text, 3),
                Question::new(10, "first", QuestionType::Rating, 1),
                Question::new(20, "second", QuestionType::Checkbox, 2),
            ],
        )
        .unwrap();

        assert_eq!(q.entry().map(|q| q.id), Some(10));
        assert_eq!(q.successor_of(10).map(|q| q.id), Some(20));
        assert_eq!(q.successor_of(20).map(|q| q.id), Some(30));
        assert!(q.successor_of(30).is_none());
        assert!(q.successor_of(99).is_none());
    }

    #[test]
    fn rejects_duplicate_ids_and_positions() {
        let dup_id = Questionnaire::new(
            survey(),
            vec![
                Question::new(1, "a", QuestionType::Text, 1),
                Question::new(1, "b", QuestionType::Text, 2),
            ],
        );
        assert!(matches!(dup_id, Err(SurveyError::DuplicateQuestion(1))));

        let dup_pos = Questionnaire::new(
            survey(),
            vec![
                Question::new(1, "a", QuestionType::Text, 4),
                Question::new(2, "b", QuestionType::Text, 4),
            ],
        );
        assert!(matches!(
            dup_pos,
            Err(SurveyError::DuplicatePosition { position: 4, .. })
        ));
    }

    #[test]
    fn empty_questionnaire_has_no_entry() {
        let q = Questionnaire::new(survey(), vec![]).unwrap();
        assert!(q.is_empty());
        assert!(q.entry().is_none());
    }

    #[test]
    fn lint_reports_authoring_problems() {
        let q = Questionnaire::new(
            survey(),
            vec![
                Question::new(1, "role", QuestionType::MultipleChoice, 1)
                    .with_options(["A", "B"])
                    .with_branch(
                        BranchMapping::new()
                            .route("A", "7xyz")
                            .route("B", "42")
                            .route("*", "2"),
                    ),
                Question::new(2, "why", QuestionType::Text, 2)
                    .with_branch(BranchMapping::new().route("*", "END")),
            ],
        )
        .unwrap();

        let issues = q.lint();
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&BranchIssue::WildcardIgnored { question_id: 1 }));
        assert!(issues.contains(&BranchIssue::UnknownTarget {
            question_id: 1,
            key: "B".into(),
            target_id: 42,
        }));
        assert!(issues.iter().any(|i| matches!(i, BranchIssue::UnresolvableTarget { target, .. } if target == "7xyz")));
    }
}
