//! End-to-end traversal behaviour over realistic questionnaires.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use survey_core::wire::ResponseEnvelope;
use survey_core::{AnswerValue, BranchMapping, Question, QuestionType, Questionnaire, Survey, SurveyId};
use survey_navigation::submission::TransportReply;
use survey_navigation::{
    BranchResolver, NavigationSession, StepOutcome, SubmissionError, SubmissionTransport, Submitter,
};

fn survey(id: SurveyId) -> Survey {
    Survey {
        id,
        title: "Engineering Team Satisfaction Survey".into(),
        description: "Quarterly pulse for the platform org".into(),
        branches: vec![],
    }
}

fn session(questions: Vec<Question>) -> NavigationSession {
    let questionnaire = Questionnaire::new(survey(1), questions).expect("valid questionnaire");
    NavigationSession::new(Arc::new(questionnaire), None)
}

fn text(id: i64, position: i32) -> Question {
    Question::new(id, format!("Question {id}"), QuestionType::Text, position)
}

#[test]
fn linear_traversal_visits_every_question_in_position_order() {
    // Ids deliberately out of position order.
    let positions = [(40, 1), (10, 2), (30, 3), (20, 4), (50, 5)];
    let mut s = session(positions.iter().map(|(id, pos)| text(*id, *pos)).collect());

    let mut steps = Vec::new();
    while !s.is_finished() {
        steps.push(s.advance(Some("fine".into())).expect("optional questions always pass"));
    }

    assert_eq!(steps.last(), Some(&StepOutcome::Finished));
    assert_eq!(s.state().history, vec![40, 10, 30, 20, 50]);
    assert_eq!(s.state().history.len(), positions.len());
}

#[test]
fn end_target_finishes_regardless_of_order() {
    let gate = Question::new(1, "Do you manage people?", QuestionType::MultipleChoice, 1)
        .with_options(["Yes", "No"])
        .with_branch(BranchMapping::new().route("No", "END"));
    let mut s = session(vec![gate, text(2, 2), text(3, 3)]);

    assert_eq!(s.advance(Some("No".into())), Ok(StepOutcome::Finished));
    assert_eq!(s.state().current, None);
    assert_eq!(s.state().history, vec![1]);
}

#[test]
fn wildcard_routes_unmatched_free_text() {
    let open = text(1, 1).with_branch(
        BranchMapping::new()
            .route("nothing", "3")
            .route("*", "4"),
    );
    let mut s = session(vec![open, text(2, 2), text(3, 3), text(4, 4)]);

    assert_eq!(
        s.advance(Some("More pairing time".into())),
        Ok(StepOutcome::Moved { to: 4 })
    );

    s.retreat();
    assert_eq!(s.advance(Some("nothing".into())), Ok(StepOutcome::Moved { to: 3 }));
}

#[test]
fn wildcard_is_ignored_for_choice_questions() {
    let choice = Question::new(1, "Team", QuestionType::MultipleChoice, 1)
        .with_options(["Infra", "Web"])
        .with_branch(BranchMapping::new().route("*", "END"));
    let mut s = session(vec![choice, text(2, 2)]);

    assert_eq!(s.advance(Some("Infra".into())), Ok(StepOutcome::Moved { to: 2 }));
}

#[test]
fn back_then_next_returns_to_the_same_question() {
    let role = Question::new(1, "Role", QuestionType::MultipleChoice, 1)
        .required()
        .with_options(["Data Engineer", "Product Manager"])
        .with_branch(
            BranchMapping::new()
                .route("Data Engineer", "3")
                .route("Product Manager", "2"),
        );
    let mut s = session(vec![role, text(2, 2), text(3, 3), text(4, 4)]);

    s.advance(Some("Data Engineer".into())).unwrap();
    s.advance(Some("Airflow".into())).unwrap();
    let forward = s.state().current;
    assert_eq!(forward, Some(4));

    assert_eq!(s.retreat(), Some(3));
    s.advance(Some("Airflow".into())).unwrap();
    assert_eq!(s.state().current, forward);
    assert_eq!(s.state().history, vec![1, 3, 4]);
}

#[test]
fn checkbox_answer_uses_first_mapped_element() {
    let tools = Question::new(1, "Which tools?", QuestionType::Checkbox, 1)
        .with_options(["A", "B", "C"])
        .with_branch(BranchMapping::new().route("B", "5"));
    let questionnaire = Questionnaire::new(
        survey(1),
        vec![tools.clone(), text(2, 2), text(5, 5)],
    )
    .unwrap();

    let answer = AnswerValue::from(vec!["A", "B"]);
    let next = BranchResolver::new().resolve(&questionnaire, &tools, Some(&answer));
    assert_eq!(next, Some(5));
}

#[test]
fn unparseable_target_finishes_instead_of_failing() {
    let broken = text(1, 1).with_branch(BranchMapping::new().route("yes", "7xyz"));
    let mut s = session(vec![broken, text(2, 2)]);

    assert_eq!(s.advance(Some("yes".into())), Ok(StepOutcome::Finished));
}

#[test]
fn answers_from_an_abandoned_branch_are_still_packaged() {
    let role = Question::new(1, "Role", QuestionType::MultipleChoice, 1)
        .with_options(["Data", "Product"])
        .with_branch(BranchMapping::new().route("Data", "2").route("Product", "3"));
    let data = text(2, 2).with_branch(BranchMapping::new().route("*", "END"));
    let product = text(3, 3).with_branch(BranchMapping::new().route("*", "END"));
    let mut s = session(vec![role, data, product]);

    s.advance(Some("Data".into())).unwrap();
    s.record_answer(2, "dbt".into()).unwrap();
    s.retreat();
    s.advance(Some("Product".into())).unwrap();
    s.advance(Some("Roadmaps".into())).unwrap();
    s.settle();

    let batch = s.prepare_submission().unwrap();
    assert_eq!(s.state().history, vec![1, 3]);
    let ids: Vec<_> = batch.items.iter().map(|item| item.question_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

struct CountingTransport(Arc<AtomicUsize>);

#[async_trait]
impl SubmissionTransport for CountingTransport {
    async fn submit(
        &self,
        _survey_id: SurveyId,
        _envelope: &ResponseEnvelope,
    ) -> Result<TransportReply, SubmissionError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(TransportReply { status: 201, body: None })
    }
}

#[tokio::test]
async fn unanswered_visited_required_question_blocks_submit_locally() {
    let mut s = session(vec![text(1, 1).required(), text(2, 2)]);
    s.advance(Some("Platform".into())).unwrap();
    s.record_answer(1, "".into()).unwrap();
    s.advance(None).unwrap();
    s.settle();

    let calls = Arc::new(AtomicUsize::new(0));
    let submitter = Submitter::new(CountingTransport(calls.clone()));
    let err = submitter.submit(&s).await.unwrap_err();

    assert_eq!(err.to_string(), "Please answer all required questions.");
    assert!(matches!(err, SubmissionError::Incomplete { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn complete_traversal_submits_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut s = session(vec![text(1, 1).required(), text(2, 2)]);
    s.advance(Some("Platform".into())).unwrap();
    s.advance(Some("More docs".into())).unwrap();
    s.settle();

    let submitter = Submitter::new(CountingTransport(calls.clone()));
    let receipt = submitter.submit(&s).await.unwrap();
    assert_eq!(receipt.created, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
