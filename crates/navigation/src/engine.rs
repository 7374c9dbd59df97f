use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use survey_core::event_bus::{make_event, noop_sink, EventSink};
use survey_core::types::SurveyEventType;
use survey_core::{AnswerValue, QuestionId, Questionnaire};
use tracing::{info, warn};
use uuid::Uuid;

use crate::packager::BatchSubmission;
use crate::presenter::{self, Screen, SubmissionSummary};
use crate::session::NavigationSession;
use crate::types::{NavigationError, StepOutcome};

/// Idle time after which a session a respondent walked away from may be evicted.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Holds many independent navigation sessions, keyed by session id.
///
/// Sessions never share state; the engine only provides lookup and emits
/// lifecycle events. Respondents can close the client at any point, so idle
/// sessions are evicted once the limit is reached.
#[derive(Clone)]
pub struct SessionEngine {
    sessions: Arc<DashMap<Uuid, NavigationSession>>,
    event_sink: Arc<dyn EventSink>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("sessions", &self.sessions.len())
            .field("max_sessions", &self.max_sessions)
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}

impl SessionEngine {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            event_sink: noop_sink(),
            max_sessions,
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Attach an event sink for lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Begins a traversal of `questionnaire` and returns its session id.
    pub fn start_session(
        &self,
        questionnaire: Arc<Questionnaire>,
        branch: Option<String>,
    ) -> Result<Uuid, NavigationError> {
        if self.sessions.len() >= self.max_sessions {
            self.evict_idle(Utc::now());
        }
        if self.sessions.len() >= self.max_sessions {
            warn!(limit = self.max_sessions, "Session limit reached");
            return Err(NavigationError::SessionLimit(self.max_sessions));
        }

        let session = NavigationSession::new(questionnaire, branch);
        let id = session.id();
        let survey_id = session.survey_id();
        let entry = session.state().current;

        info!(session_id = %id, survey_id, entry = ?entry, "Session started");
        metrics::counter!("survey.sessions.started").increment(1);
        self.event_sink
            .emit(make_event(SurveyEventType::SessionStarted, survey_id, Some(id), entry));

        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Returns a clone of the session, if it exists.
    pub fn get(&self, id: &Uuid) -> Option<NavigationSession> {
        self.sessions.get(id).map(|r| r.clone())
    }

    /// Removes sessions idle for at least the TTL as of `now`, except those
    /// with a submission in flight. Returns how many were evicted.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|s| !s.is_submitting() && s.idle_for(now) >= self.idle_ttl)
            .map(|s| *s.key())
            .collect();

        let mut evicted = 0;
        for id in expired {
            let Some((_, session)) = self
                .sessions
                .remove_if(&id, |_, s| !s.is_submitting() && s.idle_for(now) >= self.idle_ttl)
            else {
                continue;
            };
            evicted += 1;
            info!(
                session_id = %id,
                survey_id = session.survey_id(),
                started_at = %session.started_at(),
                "Idle session evicted"
            );
            self.event_sink.emit(make_event(
                SurveyEventType::SessionExpired,
                session.survey_id(),
                Some(id),
                session.state().current,
            ));
        }
        if evicted > 0 {
            metrics::counter!("survey.sessions.expired").increment(evicted as u64);
        }
        evicted
    }

    /// The screen the respondent should see now. Rendering a finished screen
    /// completes the two-phase finish, so the next call shows submit enabled.
    pub fn screen(&self, id: &Uuid) -> Result<Screen, NavigationError> {
        let mut session = self.session_mut(id)?;
        let screen = presenter::render(&session, session.is_submitting());
        session.settle();
        Ok(screen)
    }

    pub fn record_answer(
        &self,
        id: &Uuid,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<(), NavigationError> {
        let mut session = self.idle_session_mut(id)?;
        session.record_answer(question_id, value)?;
        self.event_sink.emit(make_event(
            SurveyEventType::AnswerRecorded,
            session.survey_id(),
            Some(*id),
            Some(question_id),
        ));
        Ok(())
    }

    pub fn advance(&self, id: &Uuid, explicit: Option<AnswerValue>) -> Result<StepOutcome, NavigationError> {
        let mut session = self.idle_session_mut(id)?;
        let survey_id = session.survey_id();
        let from = session.state().current;

        match session.advance(explicit) {
            Ok(StepOutcome::Moved { to }) => {
                metrics::counter!("survey.navigation.advanced").increment(1);
                self.event_sink
                    .emit(make_event(SurveyEventType::QuestionAdvanced, survey_id, Some(*id), Some(to)));
                Ok(StepOutcome::Moved { to })
            }
            Ok(StepOutcome::Finished) => {
                metrics::counter!("survey.navigation.finished").increment(1);
                self.event_sink
                    .emit(make_event(SurveyEventType::SurveyFinished, survey_id, Some(*id), from));
                Ok(StepOutcome::Finished)
            }
            Err(e) => {
                if e.is_validation() {
                    metrics::counter!("survey.navigation.validation_rejected").increment(1);
                    self.event_sink
                        .emit(make_event(SurveyEventType::AdvanceRejected, survey_id, Some(*id), from));
                }
                Err(e)
            }
        }
    }

    pub fn retreat(&self, id: &Uuid) -> Result<Option<QuestionId>, NavigationError> {
        let mut session = self.idle_session_mut(id)?;
        let moved = session.retreat();
        if let Some(to) = moved {
            self.event_sink.emit(make_event(
                SurveyEventType::QuestionRetreated,
                session.survey_id(),
                Some(*id),
                Some(to),
            ));
        }
        Ok(moved)
    }

    /// Audits and packages the session's answers and claims the session for
    /// that submission. Until [`SessionEngine::release_submission`] or
    /// [`SessionEngine::complete`], a second claim fails with
    /// [`NavigationError::SubmissionInProgress`] and the answers are frozen.
    pub fn claim_submission(&self, id: &Uuid) -> Result<BatchSubmission, NavigationError> {
        let mut session = self.session_mut(id)?;
        let batch = session.begin_submission()?;
        self.event_sink.emit(make_event(
            SurveyEventType::SubmissionPrepared,
            session.survey_id(),
            Some(*id),
            None,
        ));
        Ok(batch)
    }

    /// Returns a claimed session to the finished screen after a failed submission.
    pub fn release_submission(&self, id: &Uuid) -> Result<(), NavigationError> {
        let mut session = self.session_mut(id)?;
        session.end_submission();
        Ok(())
    }

    /// Discards a session after a successful submission, returning the
    /// summary of what the respondent visited.
    pub fn complete(&self, id: &Uuid) -> Result<SubmissionSummary, NavigationError> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or(NavigationError::SessionNotFound(*id))?;
        info!(session_id = %id, survey_id = session.survey_id(), "Session completed");
        self.event_sink.emit(make_event(
            SurveyEventType::SessionCompleted,
            session.survey_id(),
            Some(*id),
            None,
        ));
        Ok(SubmissionSummary::from_session(&session))
    }

    /// Drops a session without persisting anything. A session with a
    /// submission in flight cannot be abandoned.
    pub fn abandon(&self, id: &Uuid) -> Result<(), NavigationError> {
        let Some((_, session)) = self.sessions.remove_if(id, |_, s| !s.is_submitting()) else {
            return Err(if self.sessions.contains_key(id) {
                NavigationError::SubmissionInProgress
            } else {
                NavigationError::SessionNotFound(*id)
            });
        };
        info!(session_id = %id, survey_id = session.survey_id(), "Session abandoned");
        self.event_sink.emit(make_event(
            SurveyEventType::SessionAbandoned,
            session.survey_id(),
            Some(*id),
            None,
        ));
        Ok(())
    }

    fn session_mut(
        &self,
        id: &Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, NavigationSession>, NavigationError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(NavigationError::SessionNotFound(*id))?;
        session.touch();
        Ok(session)
    }

    /// A session that may change its answers: none with a submission in flight.
    fn idle_session_mut(
        &self,
        id: &Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, NavigationSession>, NavigationError> {
        let session = self.session_mut(id)?;
        if session.is_submitting() {
            return Err(NavigationError::SubmissionInProgress);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::event_bus::capture_sink;
    use survey_core::{BranchMapping, Question, QuestionType, Survey};

    fn questionnaire() -> Arc<Questionnaire> {
        let survey = Survey {
            id: 11,
            title: "Role-based assessment".into(),
            description: "Tailored questions per role".into(),
            branches: vec!["Data Engineer".into(), "Product Manager".into()],
        };
        let role = Question::new(1, "What is your role?", QuestionType::MultipleChoice, 1)
            .required()
            .with_options(["Data Engineer", "Product Manager"])
            .with_branch(
                BranchMapping::new()
                    .route("Data Engineer", "2")
                    .route("Product Manager", "3"),
            );
        let data = Question::new(2, "Favourite pipeline tool?", QuestionType::Text, 2)
            .with_branch(BranchMapping::new().route("*", "END"));
        let product = Question::new(3, "Roadmap confidence", QuestionType::Rating, 3).required();
        Arc::new(Questionnaire::new(survey, vec![role, data, product]).unwrap())
    }

    #[test]
    fn sessions_are_independent() {
        let engine = SessionEngine::new(10);
        let a = engine.start_session(questionnaire(), None).unwrap();
        let b = engine.start_session(questionnaire(), None).unwrap();

        engine.advance(&a, Some("Data Engineer".into())).unwrap();
        assert_eq!(engine.get(&a).unwrap().state().current, Some(2));
        assert_eq!(engine.get(&b).unwrap().state().current, Some(1));
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn full_flow_emits_events() {
        let sink = capture_sink();
        let engine = SessionEngine::new(10).with_event_sink(sink.clone());
        let id = engine.start_session(questionnaire(), Some("Data Engineer".into())).unwrap();

        assert!(engine.advance(&id, None).is_err());
        assert_eq!(sink.count_type(SurveyEventType::AdvanceRejected), 1);

        engine.record_answer(&id, 1, "Data Engineer".into()).unwrap();
        assert_eq!(engine.advance(&id, None), Ok(StepOutcome::Moved { to: 2 }));
        assert_eq!(engine.advance(&id, Some("dbt".into())), Ok(StepOutcome::Finished));

        // Submit is not armed until the finished screen has been rendered.
        assert_eq!(engine.claim_submission(&id), Err(NavigationError::SubmitNotReady));
        let screen = engine.screen(&id).unwrap();
        assert!(matches!(screen, Screen::Finished { submit_enabled: false, .. }));
        let screen = engine.screen(&id).unwrap();
        assert!(matches!(screen, Screen::Finished { submit_enabled: true, .. }));

        let batch = engine.claim_submission(&id).unwrap();
        assert_eq!(batch.len(), 2);

        let summary = engine.complete(&id).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert!(engine.get(&id).is_none());
        assert_eq!(sink.count_type(SurveyEventType::SessionStarted), 1);
        assert_eq!(sink.count_type(SurveyEventType::SurveyFinished), 1);
        assert_eq!(sink.count_type(SurveyEventType::SessionCompleted), 1);
        let trail = sink.session_trail(id);
        assert_eq!(trail.first(), Some(&(SurveyEventType::SessionStarted, Some(1))));
        assert_eq!(trail.last(), Some(&(SurveyEventType::SessionCompleted, None)));
    }

    #[test]
    fn limit_and_missing_sessions() {
        let engine = SessionEngine::new(1);
        let id = engine.start_session(questionnaire(), None).unwrap();
        assert_eq!(
            engine.start_session(questionnaire(), None),
            Err(NavigationError::SessionLimit(1))
        );

        engine.abandon(&id).unwrap();
        assert!(engine.is_empty());
        assert_eq!(engine.retreat(&id), Err(NavigationError::SessionNotFound(id)));
    }

    fn finished(engine: &SessionEngine) -> Uuid {
        let id = engine.start_session(questionnaire(), None).unwrap();
        engine.advance(&id, Some("Data Engineer".into())).unwrap();
        engine.advance(&id, Some("Airflow".into())).unwrap();
        engine.screen(&id).unwrap();
        id
    }

    #[test]
    fn concurrent_submission_is_refused_while_claimed() {
        let engine = SessionEngine::new(10);
        let id = finished(&engine);

        assert!(engine.claim_submission(&id).is_ok());
        assert_eq!(engine.claim_submission(&id), Err(NavigationError::SubmissionInProgress));
        assert_eq!(engine.retreat(&id), Err(NavigationError::SubmissionInProgress));
        assert!(matches!(
            engine.screen(&id).unwrap(),
            Screen::Finished { submitting: true, submit_enabled: false, back_enabled: false }
        ));

        assert_eq!(engine.abandon(&id), Err(NavigationError::SubmissionInProgress));

        engine.release_submission(&id).unwrap();
        assert!(engine.claim_submission(&id).is_ok());
    }

    #[test]
    fn idle_sessions_are_evicted_to_make_room() {
        let sink = capture_sink();
        let engine = SessionEngine::new(2)
            .with_idle_ttl(Duration::ZERO)
            .with_event_sink(sink.clone());
        let first = engine.start_session(questionnaire(), None).unwrap();
        engine.start_session(questionnaire(), None).unwrap();

        let third = engine.start_session(questionnaire(), None).unwrap();
        assert_eq!(engine.len(), 1);
        assert!(engine.get(&first).is_none());
        assert!(engine.get(&third).is_some());
        assert_eq!(sink.count_type(SurveyEventType::SessionExpired), 2);
    }

    #[test]
    fn eviction_spares_active_and_submitting_sessions() {
        let engine = SessionEngine::new(10);
        let active = engine.start_session(questionnaire(), None).unwrap();
        let submitting = finished(&engine);
        engine.claim_submission(&submitting).unwrap();

        assert_eq!(engine.evict_idle(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(engine.evict_idle(later), 1);
        assert!(engine.get(&active).is_none());
        assert!(engine.get(&submitting).is_some());
    }
}
