//! Survey lifecycle events.
//!
//! The navigation engine and the response handler accept an
//! `Arc<dyn EventSink>`; the binary decides where events go.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::types::{QuestionId, SurveyEvent, SurveyEventType, SurveyId};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SurveyEvent);
}

/// Discards events. Default for engines built without a sink.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: SurveyEvent) {}
}

/// Writes each event as a structured debug record tagged with the node.
pub struct TracingSink {
    node_id: String,
}

impl TracingSink {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: SurveyEvent) {
        debug!(
            node_id = %self.node_id,
            event_type = ?event.event_type,
            survey_id = event.survey_id,
            session_id = ?event.session_id,
            question_id = ?event.question_id,
            "Survey event"
        );
    }
}

/// Keeps every event in memory so a respondent's path can be inspected.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SurveyEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<SurveyEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<SurveyEvent> {
        self.guard().clone()
    }

    pub fn count_type(&self, event_type: SurveyEventType) -> usize {
        self.guard().iter().filter(|e| e.event_type == event_type).count()
    }

    /// One session's events in emission order, as (type, question) pairs.
    pub fn session_trail(&self, session_id: Uuid) -> Vec<(SurveyEventType, Option<QuestionId>)> {
        self.guard()
            .iter()
            .filter(|e| e.session_id == Some(session_id))
            .map(|e| (e.event_type, e.question_id))
            .collect()
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: SurveyEvent) {
        self.guard().push(event);
    }
}

pub fn make_event(
    event_type: SurveyEventType,
    survey_id: SurveyId,
    session_id: Option<Uuid>,
    question_id: Option<QuestionId>,
) -> SurveyEvent {
    SurveyEvent {
        event_id: Uuid::new_v4(),
        event_type,
        survey_id,
        session_id,
        question_id,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
