use std::sync::Arc;

use serde::{Deserialize, Serialize};
use survey_core::{AnswerValue, Question, QuestionId, Questionnaire};
use tracing::{debug, info};

use crate::resolver::BranchResolver;
use crate::types::{NavigationError, NavigationPhase, NavigationState, StepOutcome};
use crate::validation::ValidationGate;

/// Describes a single valid phase transition of a traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: NavigationPhase,
    pub to: NavigationPhase,
    pub trigger: String,
}

/// Owns one respondent's position, history and answers, and moves them
/// forward and backward through a questionnaire.
///
/// Entering `Finished` is two-phase: the transition happens synchronously,
/// but the submit control stays disarmed until [`settle`](Self::settle) is
/// called after the finished screen has been rendered, so the action that
/// finished the survey cannot also submit it.
#[derive(Debug, Clone)]
pub struct NavigationStateMachine {
    questionnaire: Arc<Questionnaire>,
    state: NavigationState,
    transitions: Vec<StateTransition>,
    resolver: BranchResolver,
    gate: ValidationGate,
    submit_armed: bool,
}

impl NavigationStateMachine {
    /// Starts at the entry question, or finished when there are no questions.
    pub fn new(questionnaire: Arc<Questionnaire>) -> Self {
        let transitions = vec![
            StateTransition {
                from: NavigationPhase::Active,
                to: NavigationPhase::Active,
                trigger: "advance".to_string(),
            },
            StateTransition {
                from: NavigationPhase::Active,
                to: NavigationPhase::Finished,
                trigger: "finish".to_string(),
            },
            StateTransition {
                from: NavigationPhase::Active,
                to: NavigationPhase::Active,
                trigger: "retreat".to_string(),
            },
            StateTransition {
                from: NavigationPhase::Finished,
                to: NavigationPhase::Active,
                trigger: "retreat".to_string(),
            },
        ];

        let state = match questionnaire.entry() {
            Some(entry) => NavigationState {
                current: Some(entry.id),
                history: vec![entry.id],
                cursor: 0,
                finished: false,
                ..Default::default()
            },
            None => NavigationState {
                finished: true,
                ..Default::default()
            },
        };

        Self {
            questionnaire,
            state,
            transitions,
            resolver: BranchResolver::new(),
            gate: ValidationGate::new(),
            submit_armed: false,
        }
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn phase(&self) -> NavigationPhase {
        self.state.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.state.current.and_then(|id| self.questionnaire.get(id))
    }

    /// Returns `true` if the given phase change is allowed for `trigger`.
    pub fn can_transition(&self, from: NavigationPhase, to: NavigationPhase, trigger: &str) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == from && t.to == to && t.trigger == trigger)
    }

    /// Records (or replaces) the answer for a question of this survey.
    pub fn record_answer(&mut self, question_id: QuestionId, value: AnswerValue) -> Result<(), NavigationError> {
        if !self.questionnaire.contains(question_id) {
            return Err(NavigationError::UnknownQuestion(question_id));
        }
        self.state.answers.insert(question_id, value);
        Ok(())
    }

    /// Next. Uses `explicit` (which is also recorded) or the recorded answer
    /// for the current question. Rejected advances leave the state untouched.
    pub fn advance(&mut self, explicit: Option<AnswerValue>) -> Result<StepOutcome, NavigationError> {
        let from = self.phase();
        let current_id = match self.state.current {
            Some(id) if !self.state.finished => id,
            _ => return Err(NavigationError::NotActive),
        };
        let question = self
            .questionnaire
            .get(current_id)
            .ok_or(NavigationError::UnknownQuestion(current_id))?;

        let answer = explicit.as_ref().or_else(|| self.state.answers.get(&current_id));
        self.gate.can_advance(question, answer)?;
        let next = self.resolver.resolve(&self.questionnaire, question, answer);

        if let Some(value) = explicit {
            self.state.answers.insert(current_id, value);
        }

        // Branching makes forward history path-dependent.
        self.state.history.truncate(self.state.cursor + 1);

        match next {
            Some(next_id) if self.can_transition(from, NavigationPhase::Active, "advance") => {
                self.state.history.push(next_id);
                self.state.cursor += 1;
                self.state.current = Some(next_id);
                debug!(from = current_id, to = next_id, "Advanced");
                Ok(StepOutcome::Moved { to: next_id })
            }
            _ => {
                debug_assert!(self.can_transition(from, NavigationPhase::Finished, "finish"));
                self.state.current = None;
                self.state.cursor = self.state.history.len();
                self.state.finished = true;
                self.submit_armed = false;
                info!(
                    survey_id = self.questionnaire.survey().id,
                    last_question = current_id,
                    visited = self.state.history.len(),
                    "Traversal finished"
                );
                Ok(StepOutcome::Finished)
            }
        }
    }

    /// Back. Returns the question now shown, or `None` when there is no
    /// earlier entry (a no-op).
    pub fn retreat(&mut self) -> Option<QuestionId> {
        if self.state.cursor == 0 || self.state.history.is_empty() {
            return None;
        }
        let from = self.phase();
        if !self.can_transition(from, NavigationPhase::Active, "retreat") {
            return None;
        }

        let index = self.state.cursor.min(self.state.history.len()) - 1;
        let target = self.state.history[index];
        self.state.cursor = index;
        self.state.current = Some(target);
        self.state.finished = false;
        self.submit_armed = false;
        debug!(to = target, "Retreated");
        Some(target)
    }

    pub fn can_retreat(&self) -> bool {
        self.state.cursor > 0 && !self.state.history.is_empty()
    }

    /// Second phase of finishing: the finished screen has been rendered and
    /// the submit control may now accept input.
    pub fn settle(&mut self) {
        if self.state.finished {
            self.submit_armed = true;
        }
    }

    pub fn is_submit_armed(&self) -> bool {
        self.state.finished && self.submit_armed
    }
}
