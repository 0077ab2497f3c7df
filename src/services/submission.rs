// src/services/submission.rs

use chrono::Utc;
use serde_json::{Map, Value};

use crate::{
    error::AppError,
    models::{
        score_record::{AnsweredQuestion, NewScoreRecord, ScoreRecord, SubmitTestRequest},
        test::Test,
    },
    store::{Store, Submission, SubmissionLedger, UserDirectory},
};

/// Records a student's attempt.
///
/// * Resolves the student in the user directory.
/// * Validates `question_appeared` (missing per-answer fields default to "" / 0).
/// * Hands the record to the ledger, which stores it, appends the appearance
///   and recomputes the test average in one transaction.
pub async fn submit(
    store: &dyn Store,
    student_id: i64,
    req: SubmitTestRequest,
    allow_resubmission: bool,
) -> Result<(ScoreRecord, Test), AppError> {
    store
        .find_user(student_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let answers = parse_answers(req.question_appeared.as_ref())?;

    let test_id = req
        .test_id
        .ok_or(AppError::BadRequest("test_id is required".to_string()))?;
    let marks_obtained = req
        .marks_obtained
        .filter(|m| m.is_finite())
        .ok_or(AppError::BadRequest(
            "marks_obtained must be a number".to_string(),
        ))?;

    let submission = Submission {
        record: NewScoreRecord {
            student_id,
            test_id,
            name: req.name,
            email: req.email,
            prn: req.prn,
            marks_obtained,
            answers,
        },
        submitted_at: Utc::now(),
        allow_resubmission,
    };

    let (record, test) = store
        .record_submission(submission)
        .await
        .inspect_err(|e| {
            if let AppError::Conflict(_) = e {
                tracing::warn!(
                    "Rejected resubmission of test {} by student {}",
                    test_id,
                    student_id
                );
            }
        })?;

    tracing::info!(
        "Student {} submitted test {} ({} marks, average now {:.2})",
        student_id,
        test_id,
        record.marks_obtained,
        test.average_score
    );

    Ok((record, test))
}

/// Parses the submitted answer list. The list may be empty but must be an
/// array of objects.
pub fn parse_answers(raw: Option<&Value>) -> Result<Vec<AnsweredQuestion>, AppError> {
    let Some(Value::Array(items)) = raw else {
        return Err(AppError::BadRequest("Invalid question data".to_string()));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<AnsweredQuestion, AppError> {
            let invalid =
                || AppError::BadRequest(format!("Invalid question data at position {}", index + 1));
            let fields = item.as_object().ok_or_else(invalid)?;

            Ok(AnsweredQuestion {
                given_answer: text_field(fields, "your_answer").ok_or_else(invalid)?,
                correct_answer: text_field(fields, "correct_answer").ok_or_else(invalid)?,
                points_awarded: number_field(fields, "mark").ok_or_else(invalid)?,
            })
        })
        .collect()
}

/// Absent or null reads as "", scalars are stringified, nested values are invalid.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(_) => None,
    }
}

/// Absent or null reads as 0; numeric strings are accepted.
fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let number = match fields.get(key) {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    number.filter(|n| n.is_finite())
}
