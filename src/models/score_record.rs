// src/models/score_record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// Represents the 'score_records' table in the database.
/// One immutable row per accepted submission.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub student_id: i64,
    /// Plain reference; the test may since have been deleted.
    pub test_id: i64,
    pub name: String,
    pub email: String,
    pub prn: String,
    pub marks_obtained: f64,
    pub answers: Json<Vec<AnsweredQuestion>>,
    pub created_at: DateTime<Utc>,
}

/// A single graded answer inside a score record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub given_answer: String,
    pub correct_answer: String,
    pub points_awarded: f64,
}

/// Insert payload for the score record store.
#[derive(Debug, Clone)]
pub struct NewScoreRecord {
    pub student_id: i64,
    pub test_id: i64,
    pub name: String,
    pub email: String,
    pub prn: String,
    pub marks_obtained: f64,
    pub answers: Vec<AnsweredQuestion>,
}

/// DTO for submitting a test attempt.
///
/// `question_appeared` stays untyped so a malformed list is reported as a
/// validation error naming the offending entry.
#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    pub test_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub prn: String,
    pub marks_obtained: Option<f64>,
    pub question_appeared: Option<serde_json::Value>,
}
