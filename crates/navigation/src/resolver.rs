use serde::{Deserialize, Serialize};
use survey_core::{AnswerValue, BranchTarget, Question, QuestionId, Questionnaire};
use tracing::{debug, warn};

/// Which rule produced the next question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// An answer key matched the branch mapping.
    Branch,
    /// The `*` rule of a free-text question matched.
    Wildcard,
    /// No override applied; the next question by position.
    Linear,
}

/// Outcome of resolving one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// `None` finishes the survey.
    pub next: Option<QuestionId>,
    pub route: Route,
}

/// Computes the next question from a question's branch mapping and an answer.
/// Pure over its inputs.
#[derive(Debug, Clone, Default)]
pub struct BranchResolver;

impl BranchResolver {
    pub fn new() -> Self {
        Self
    }

    /// The next question id, or `None` to finish.
    pub fn resolve(
        &self,
        questionnaire: &Questionnaire,
        question: &Question,
        answer: Option<&AnswerValue>,
    ) -> Option<QuestionId> {
        self.explain(questionnaire, question, answer).next
    }

    /// Like [`BranchResolver::resolve`], also reporting which rule applied.
    pub fn explain(
        &self,
        questionnaire: &Questionnaire,
        question: &Question,
        answer: Option<&AnswerValue>,
    ) -> Resolution {
        if let Some(mapping) = &question.branch {
            // Lists: the first element with a non-empty entry wins.
            let matched = answer.and_then(|answer| {
                answer
                    .keys()
                    .into_iter()
                    .find_map(|key| mapping.target_for(key))
            });
            if let Some(target) = matched {
                return self.follow(questionnaire, question, target, Route::Branch);
            }

            let answered = answer.is_some_and(|a| !a.is_blank());
            if question.question_type.is_free_text() && answered {
                if let Some(target) = mapping.wildcard() {
                    return self.follow(questionnaire, question, target, Route::Wildcard);
                }
            }
        }

        let next = questionnaire.successor_of(question.id).map(|q| q.id);
        debug!(question_id = question.id, next = ?next, "Following default order");
        Resolution {
            next,
            route: Route::Linear,
        }
    }

    /// Unresolvable targets and ids outside the survey both end the flow.
    fn follow(
        &self,
        questionnaire: &Questionnaire,
        question: &Question,
        target: BranchTarget,
        route: Route,
    ) -> Resolution {
        let next = match target.destination() {
            Some(id) if questionnaire.contains(id) => Some(id),
            Some(id) => {
                warn!(question_id = question.id, target = id, "Branch target is not in this survey; finishing");
                None
            }
            None => {
                if let BranchTarget::Unresolvable { raw } = &target {
                    warn!(question_id = question.id, target = %raw, "Unresolvable branch target; finishing");
                }
                None
            }
        };
        debug!(question_id = question.id, ?route, next = ?next, "Branch resolved");
        Resolution { next, route }
    }
}
