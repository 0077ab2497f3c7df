// src/services/answer_key.rs

//! Turns authored questions into canonical answer keys.
//!
//! MCQ answers arrive as a letter (`A`..`D`) and are stored as the option
//! text they point at, so grading never needs the option list again.

use serde_json::Value;
use thiserror::Error;

use crate::models::question::{Question, QuestionType, RawQuestion};

const ANSWER_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Why a single question was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidQuestion {
    #[error("missing question text")]
    MissingText,
    #[error("insufficient options")]
    InsufficientOptions,
    #[error("correct answer must be one of A, B, C, D")]
    InvalidAnswerLetter,
    #[error("correct answer out of range")]
    AnswerOutOfRange,
    #[error("missing answer")]
    MissingAnswer,
    #[error("unknown question type")]
    UnknownType,
}

/// Rejection of a question set, pointing at the first bad question (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("question {position}: {reason}")]
pub struct AnswerKeyError {
    pub position: usize,
    pub reason: InvalidQuestion,
}

/// Validates every question, failing as a whole on the first invalid one.
pub fn validate(raw: &[RawQuestion]) -> Result<Vec<Question>, AnswerKeyError> {
    raw.iter()
        .enumerate()
        .map(|(index, question)| {
            validate_question(question).map_err(|reason| AnswerKeyError {
                position: index + 1,
                reason,
            })
        })
        .collect()
}

fn validate_question(raw: &RawQuestion) -> Result<Question, InvalidQuestion> {
    let text = raw
        .question
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(InvalidQuestion::MissingText)?;

    let question_type = raw
        .question_type
        .as_deref()
        .and_then(QuestionType::parse)
        .ok_or(InvalidQuestion::UnknownType)?;

    let points = parse_points(raw.marks.as_ref());

    match question_type {
        QuestionType::Mcq => {
            let options = raw
                .options
                .as_ref()
                .filter(|o| o.len() >= 2)
                .ok_or(InvalidQuestion::InsufficientOptions)?;

            let index = answer_index(raw.correct_answer.as_deref().unwrap_or_default())?;
            let correct_answer = options
                .get(index)
                .cloned()
                .ok_or(InvalidQuestion::AnswerOutOfRange)?;

            Ok(Question {
                question_type,
                text,
                options: Some(options.clone()),
                correct_answer,
                points,
            })
        }
        QuestionType::DirectAnswer => {
            let correct_answer = raw
                .correct_answer
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .ok_or(InvalidQuestion::MissingAnswer)?;

            Ok(Question {
                question_type,
                text,
                options: None,
                correct_answer: correct_answer.to_string(),
                points,
            })
        }
    }
}

/// Resolves a single answer letter to a zero-based option index.
fn answer_index(letter: &str) -> Result<usize, InvalidQuestion> {
    let mut chars = letter.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ANSWER_LETTERS
            .iter()
            .position(|l| *l == c.to_ascii_uppercase())
            .ok_or(InvalidQuestion::InvalidAnswerLetter),
        _ => Err(InvalidQuestion::InvalidAnswerLetter),
    }
}

/// Numbers and numeric strings are taken as-is (negatives included);
/// anything else is worth zero.
fn parse_points(marks: Option<&Value>) -> f64 {
    let points = match marks {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    points.filter(|p| p.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mcq(options: &[&str], answer: &str) -> RawQuestion {
        RawQuestion {
            question_type: Some("mcq".to_string()),
            question: Some("Pick one".to_string()),
            options: Some(options.iter().map(|o| o.to_string()).collect()),
            correct_answer: Some(answer.to_string()),
            marks: Some(json!(5)),
        }
    }

    fn direct(answer: Option<&str>) -> RawQuestion {
        RawQuestion {
            question_type: Some("directAnswer".to_string()),
            question: Some("Capital of France?".to_string()),
            options: None,
            correct_answer: answer.map(str::to_string),
            marks: None,
        }
    }

    fn reason(raw: RawQuestion) -> InvalidQuestion {
        validate(&[raw]).unwrap_err().reason
    }

    #[test]
    fn mcq_letter_resolves_to_option_text() {
        let questions = validate(&[mcq(&["red", "green", "blue", "pink"], "b")]).unwrap();
        assert_eq!(questions[0].correct_answer, "green");
        assert_eq!(questions[0].points, 5.0);
        assert_eq!(questions[0].question_type, QuestionType::Mcq);
    }

    #[test]
    fn mcq_letter_must_fit_the_option_list() {
        let letters = ["A", "B", "C", "D"];
        for n in 2..=5 {
            let options: Vec<String> = (0..n).map(|i| format!("option {}", i)).collect();
            let refs: Vec<&str> = options.iter().map(String::as_str).collect();
            for (index, letter) in letters.iter().enumerate() {
                let result = validate(&[mcq(&refs, letter)]);
                if index < n {
                    assert_eq!(result.unwrap()[0].correct_answer, options[index]);
                } else {
                    assert_eq!(result.unwrap_err().reason, InvalidQuestion::AnswerOutOfRange);
                }
            }
        }
    }

    #[test]
    fn letters_outside_a_to_d_are_rejected() {
        let options = ["1", "2", "3", "4", "5"];
        assert_eq!(reason(mcq(&options, "E")), InvalidQuestion::InvalidAnswerLetter);
        assert_eq!(reason(mcq(&options, "AB")), InvalidQuestion::InvalidAnswerLetter);
        assert_eq!(reason(mcq(&options, "")), InvalidQuestion::InvalidAnswerLetter);
    }

    #[test]
    fn mcq_needs_two_options() {
        assert_eq!(reason(mcq(&["only"], "A")), InvalidQuestion::InsufficientOptions);

        let mut missing = mcq(&[], "A");
        missing.options = None;
        assert_eq!(reason(missing), InvalidQuestion::InsufficientOptions);
    }

    #[test]
    fn direct_answers_are_trimmed() {
        let questions = validate(&[direct(Some("  Paris \n"))]).unwrap();
        assert_eq!(questions[0].correct_answer, "Paris");
        assert_eq!(questions[0].options, None);
        assert_eq!(questions[0].points, 0.0);
    }

    #[test]
    fn blank_direct_answer_is_rejected() {
        assert_eq!(reason(direct(Some("   "))), InvalidQuestion::MissingAnswer);
        assert_eq!(reason(direct(None)), InvalidQuestion::MissingAnswer);
    }

    #[test]
    fn text_and_type_are_required() {
        let mut no_text = direct(Some("x"));
        no_text.question = Some("  ".to_string());
        assert_eq!(reason(no_text), InvalidQuestion::MissingText);

        let mut odd_type = direct(Some("x"));
        odd_type.question_type = Some("essay".to_string());
        assert_eq!(reason(odd_type), InvalidQuestion::UnknownType);
    }

    #[test]
    fn one_bad_question_fails_the_whole_set() {
        let err = validate(&[direct(Some("ok")), mcq(&["a", "b"], "C")]).unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.to_string(), "question 2: correct answer out of range");
    }

    #[test]
    fn points_parse_leniently() {
        assert_eq!(parse_points(Some(&json!("7.5"))), 7.5);
        assert_eq!(parse_points(Some(&json!(-2))), -2.0);
        assert_eq!(parse_points(Some(&json!("lots"))), 0.0);
        assert_eq!(parse_points(Some(&json!(null))), 0.0);
        assert_eq!(parse_points(None), 0.0);
    }

    #[test]
    fn question_text_keeps_code_verbatim() {
        let mut raw = mcq(&["Vec<T>", "a && b"], "A");
        raw.question = Some("  What is Vec<T> and is 2 < 3 && 3 > 1?  ".to_string());
        let questions = validate(&[raw]).unwrap();
        assert_eq!(questions[0].text, "What is Vec<T> and is 2 < 3 && 3 > 1?");
        assert_eq!(questions[0].correct_answer, "Vec<T>");
    }
}
