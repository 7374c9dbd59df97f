//! In-memory survey repository fed from JSON question feeds.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use survey_core::{Questionnaire, SurveyFeed, SurveyId, SurveyResult};
use tracing::{info, warn};

/// A feed file holds one survey or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Many(Vec<SurveyFeed>),
    One(SurveyFeed),
}

/// Thread-safe store of loaded questionnaires, keyed by survey id.
#[derive(Default)]
pub struct SurveyRepository {
    surveys: DashMap<SurveyId, Arc<Questionnaire>>,
}

impl SurveyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a survey. Branch authoring problems are logged, not rejected.
    pub fn insert(&self, questionnaire: Questionnaire) -> Arc<Questionnaire> {
        let survey_id = questionnaire.survey().id;
        for issue in questionnaire.lint() {
            warn!(survey_id, issue = %issue, "Branch mapping issue");
        }
        let questionnaire = Arc::new(questionnaire);
        self.surveys.insert(survey_id, questionnaire.clone());
        questionnaire
    }

    pub fn get(&self, survey_id: SurveyId) -> Option<Arc<Questionnaire>> {
        self.surveys.get(&survey_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }

    /// Surveys ordered by id.
    pub fn list(&self) -> Vec<Arc<Questionnaire>> {
        let mut surveys: Vec<_> = self.surveys.iter().map(|r| r.value().clone()).collect();
        surveys.sort_by_key(|q| q.survey().id);
        surveys
    }

    /// Loads every survey in a JSON feed document, returning how many were added.
    pub fn load_feed_str(&self, json: &str) -> SurveyResult<usize> {
        let feeds = match serde_json::from_str::<FeedDocument>(json)? {
            FeedDocument::Many(feeds) => feeds,
            FeedDocument::One(feed) => vec![feed],
        };
        let count = feeds.len();
        for feed in feeds {
            let questionnaire = feed.into_questionnaire()?;
            info!(
                survey_id = questionnaire.survey().id,
                questions = questionnaire.len(),
                "Survey loaded"
            );
            self.insert(questionnaire);
        }
        Ok(count)
    }

    pub fn load_feed_file(&self, path: impl AsRef<Path>) -> SurveyResult<usize> {
        let json = std::fs::read_to_string(path.as_ref())?;
        self.load_feed_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::SurveyError;

    const FEED: &str = r#"[
        {
            "survey": { "id": 1, "title": "Engineering Team Satisfaction Survey", "description": "Quarterly" },
            "questions": [
                { "id": 2, "content": "Anything else?", "question_type": "long_text", "position": 2 },
                { "id": 1, "content": "Role", "question_type": "multiple_choice", "position": 1,
                  "required": true, "options": ["Data Engineer", "Product Manager"],
                  "branch": "{\"Data Engineer\":\"2\",\"Product Manager\":\"END\"}" }
            ]
        },
        { "survey": { "id": 2, "title": "Empty" } }
    ]"#;

    #[test]
    fn loads_feed_lists_and_single_feeds() {
        let repo = SurveyRepository::new();
        assert_eq!(repo.load_feed_str(FEED).unwrap(), 2);
        assert_eq!(repo.len(), 2);

        let survey = repo.get(1).unwrap();
        assert_eq!(survey.entry().map(|q| q.id), Some(1));
        assert!(survey.get(1).unwrap().branch.is_some());
        assert!(repo.get(2).unwrap().is_empty());

        let single = r#"{ "survey": { "id": 7, "title": "Pulse" }, "questions": [] }"#;
        assert_eq!(repo.load_feed_str(single).unwrap(), 1);
        assert_eq!(repo.list().iter().map(|q| q.survey().id).collect::<Vec<_>>(), vec![1, 2, 7]);
    }

    #[test]
    fn invalid_feeds_are_errors() {
        let repo = SurveyRepository::new();
        assert!(matches!(repo.load_feed_str("not json"), Err(SurveyError::Serialization(_))));

        let duplicate = r#"{ "survey": { "id": 3, "title": "x" }, "questions": [
            { "id": 1, "content": "a", "question_type": "text", "position": 1 },
            { "id": 2, "content": "b", "question_type": "text", "position": 1 }
        ] }"#;
        assert!(matches!(
            repo.load_feed_str(duplicate),
            Err(SurveyError::DuplicatePosition { survey_id: 3, position: 1 })
        ));
        assert!(repo.get(3).is_none());
    }
}
