//! Terminal respondent: fetches a survey, walks it one question at a time
//! and submits the batch to the response endpoint.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use survey_core::config::ClientConfig;
use survey_core::{AnswerValue, Question, QuestionType, Questionnaire, Survey, SurveyId};
use survey_navigation::presenter::{self, QuestionView, Screen, SubmissionSummary};
use survey_navigation::{HttpTransport, NavigationSession, SubmissionError, Submitter};
use tokio::io::{AsyncBufReadExt, BufReader};

/// What the respondent typed.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Back,
    Next,
    Submit,
    Quit,
    Answer(AnswerValue),
}

pub async fn run(client: &ClientConfig, survey_id: SurveyId, branch: Option<String>) -> anyhow::Result<()> {
    let questionnaire = fetch(client, survey_id).await?;
    let submitter = Submitter::new(HttpTransport::new(client)?);
    let mut session = NavigationSession::new(Arc::new(questionnaire), branch);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", session.questionnaire().survey().title);
    if !session.questionnaire().survey().description.is_empty() {
        println!("{}", session.questionnaire().survey().description);
    }

    loop {
        print_screen(&presenter::render(&session, submitter.is_submitting()));
        // The finished screen is on the terminal, so submit may now be accepted.
        session.settle();
        if let Some(controls) = finished_controls(&presenter::render(&session, submitter.is_submitting())) {
            println!("{controls}");
        }

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let question = session.current_question().cloned();

        match parse_input(&line, question.as_ref()) {
            Input::Quit => return Ok(()),
            Input::Back => {
                session.retreat();
            }
            Input::Submit if session.is_finished() => match submitter.submit(&session).await {
                Ok(receipt) => {
                    let summary = SubmissionSummary::from_session(&session);
                    print_screen(&Screen::Submitted { summary });
                    println!("{} answers saved.", receipt.created);
                    return Ok(());
                }
                Err(SubmissionError::Rejected { errors }) => {
                    for e in errors {
                        println!("  ! {e}");
                    }
                }
                Err(e) => println!("  ! {e}"),
            },
            Input::Submit | Input::Next => advance(&mut session, None),
            Input::Answer(value) => advance(&mut session, Some(value)),
        }
    }
}

fn advance(session: &mut NavigationSession, value: Option<AnswerValue>) {
    if session.is_finished() {
        println!("  Type 's' to submit or 'b' to go back.");
        return;
    }
    if let Err(e) = session.advance(value) {
        println!("  ! {e}");
    }
}

async fn fetch(client: &ClientConfig, survey_id: SurveyId) -> anyhow::Result<Questionnaire> {
    let base = client.base_url.trim_end_matches('/');
    let http = reqwest::Client::new();

    let survey: Survey = http
        .get(format!("{base}/surveys/{survey_id}"))
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("survey {survey_id} is not available"))?
        .json()
        .await?;
    let questions: Vec<Question> = http
        .get(format!("{base}/surveys/{survey_id}/questions"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(Questionnaire::new(survey, questions)?)
}

fn parse_input(line: &str, question: Option<&Question>) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "b" | "back" => return Input::Back,
        "q" | "quit" => return Input::Quit,
        "s" | "submit" => return Input::Submit,
        "" => return Input::Next,
        _ => {}
    }
    let Some(question) = question else {
        return Input::Next;
    };

    let choices = question.choices();
    let pick = |token: &str| -> String {
        token
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| choices.get(i).cloned())
            .filter(|_| question.question_type != QuestionType::Rating)
            .unwrap_or_else(|| token.to_string())
    };

    match question.question_type {
        QuestionType::Checkbox => Input::Answer(AnswerValue::Multiple(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(pick)
                .collect(),
        )),
        QuestionType::MultipleChoice | QuestionType::Rating => Input::Answer(pick(trimmed).into()),
        QuestionType::Text | QuestionType::LongText => Input::Answer(line.trim_end_matches(['\r', '\n']).into()),
    }
}

fn print_screen(screen: &Screen) {
    match screen {
        Screen::Question(view) => print_question(view),
        Screen::Finished { .. } => {
            println!();
            println!("You've reached the end of the survey.");
        }
        Screen::Submitted { summary } => {
            println!();
            println!("Thank you! Your responses:");
            for entry in &summary.entries {
                println!("  {}: {}", entry.content, entry.display);
            }
        }
    }
}

/// Controls line for a finished screen, taken after it has been shown.
fn finished_controls(screen: &Screen) -> Option<String> {
    let Screen::Finished {
        back_enabled,
        submit_enabled,
        submitting,
    } = screen
    else {
        return None;
    };
    if *submitting {
        return Some("Submitting...".to_string());
    }
    let mut controls = Vec::new();
    if *submit_enabled {
        controls.push("[s] submit");
    }
    if *back_enabled {
        controls.push("[b] back");
    }
    controls.push("[q] quit");
    Some(controls.join("   "))
}

fn print_question(view: &QuestionView) {
    println!();
    println!("{}{}", view.content, if view.required { " *" } else { "" });
    match view.question_type {
        QuestionType::MultipleChoice | QuestionType::Checkbox => {
            for (i, choice) in view.choices.iter().enumerate() {
                println!("  {}) {}", i + 1, choice);
            }
            if view.question_type.is_multi_select() {
                println!("  (comma-separated)");
            }
        }
        QuestionType::Rating => println!("  {}", view.choices.join(" ")),
        QuestionType::Text | QuestionType::LongText => {}
    }
    if let Some(answer) = &view.answer {
        println!("  current: {}", answer.display());
    }
    let mut controls = vec!["[enter] next"];
    if view.back_enabled {
        controls.push("[b] back");
    }
    controls.push("[q] quit");
    print!("{} > ", controls.join("   "));
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_numbers_map_to_options() {
        let q = Question::new(1, "Role", QuestionType::MultipleChoice, 1)
            .with_options(["Data Engineer", "Product Manager"]);
        assert_eq!(parse_input("2", Some(&q)), Input::Answer("Product Manager".into()));
        assert_eq!(parse_input("Data Engineer", Some(&q)), Input::Answer("Data Engineer".into()));
    }

    #[test]
    fn checkbox_input_becomes_a_list() {
        let q = Question::new(1, "Tools", QuestionType::Checkbox, 1).with_options(["Airflow", "dbt", "Spark"]);
        assert_eq!(
            parse_input("1, 3", Some(&q)),
            Input::Answer(vec!["Airflow", "Spark"].into())
        );
    }

    #[test]
    fn ratings_are_taken_literally() {
        let q = Question::new(1, "Rate", QuestionType::Rating, 1);
        assert_eq!(parse_input("4", Some(&q)), Input::Answer("4".into()));
    }

    #[test]
    fn control_words() {
        assert_eq!(parse_input(" b ", None), Input::Back);
        assert_eq!(parse_input("", None), Input::Next);
        assert_eq!(parse_input("s", None), Input::Submit);
        assert_eq!(parse_input("q", None), Input::Quit);
    }

    #[test]
    fn finished_controls_offer_submit_once_shown() {
        let survey = Survey {
            id: 1,
            title: "Pulse".into(),
            description: String::new(),
            branches: vec![],
        };
        let questionnaire =
            Questionnaire::new(survey, vec![Question::new(1, "Mood", QuestionType::Rating, 1)]).unwrap();
        let mut session = NavigationSession::new(Arc::new(questionnaire), None);
        session.advance(Some("4".into())).unwrap();

        let first = presenter::render(&session, false);
        assert_eq!(finished_controls(&first).as_deref(), Some("[b] back   [q] quit"));

        session.settle();
        let armed = presenter::render(&session, false);
        assert_eq!(finished_controls(&armed).as_deref(), Some("[s] submit   [b] back   [q] quit"));
        assert_eq!(finished_controls(&presenter::render(&session, true)).as_deref(), Some("Submitting..."));
    }
}
