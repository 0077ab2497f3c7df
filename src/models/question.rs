// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Kind of question embedded in a test.
/// Serialized with the client's historical names (`mcq`, `directAnswer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "mcq")]
    Mcq,
    #[serde(rename = "directAnswer")]
    DirectAnswer,
}

impl QuestionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mcq" => Some(QuestionType::Mcq),
            "directAnswer" => Some(QuestionType::DirectAnswer),
            _ => None,
        }
    }
}

/// Canonical question stored inside a test's `questions` JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub text: String,

    /// Present only for MCQ. Stored as given by the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Resolved answer: the option text for MCQ, the trimmed answer otherwise.
    pub correct_answer: String,

    pub points: f64,
}

/// Question as authored by the client, before answer-key resolution.
///
/// Every field is optional; the answer-key validator reports what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,

    #[serde(alias = "text", default)]
    pub question: Option<String>,

    #[serde(default)]
    pub options: Option<Vec<String>>,

    #[serde(default)]
    pub correct_answer: Option<String>,

    /// Number or numeric string; anything else counts as zero.
    #[serde(alias = "points", default)]
    pub marks: Option<serde_json::Value>,
}
