// src/store/mod.rs

//! Persistence seams for the assessment core.
//!
//! Handlers and services only see these traits. `PgStore` backs them with
//! Postgres; `MemoryStore` keeps everything in process for tests and local
//! runs. Both serialize submissions per test.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    error::AppError,
    models::{
        score_record::{NewScoreRecord, ScoreRecord},
        test::{Appearance, NewTest, Test, TestUpdate},
        user::UserProfile,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Which tests a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFilter {
    All,
    Owner(i64),
    AllocatedTo(i64),
}

impl TestFilter {
    pub fn matches(&self, test: &Test) -> bool {
        match *self {
            TestFilter::All => true,
            TestFilter::Owner(owner_id) => test.owner_id == owner_id,
            TestFilter::AllocatedTo(student_id) => test.is_allocated(student_id),
        }
    }
}

/// Which score records a lookup should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFilter {
    Student(i64),
    Test(i64),
    StudentAndTest { student_id: i64, test_id: i64 },
}

impl ScoreFilter {
    pub fn matches(&self, record: &ScoreRecord) -> bool {
        match *self {
            ScoreFilter::Student(student_id) => record.student_id == student_id,
            ScoreFilter::Test(test_id) => record.test_id == test_id,
            ScoreFilter::StudentAndTest {
                student_id,
                test_id,
            } => record.student_id == student_id && record.test_id == test_id,
        }
    }
}

/// Lookup into the account service's user table.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<UserProfile>, AppError>;
}

/// CRUD over test definitions. Never touches appearances or the average.
#[async_trait]
pub trait TestRepository: Send + Sync {
    async fn insert_test(&self, test: NewTest) -> Result<Test, AppError>;

    async fn find_test(&self, id: i64) -> Result<Option<Test>, AppError>;

    /// Matching tests ordered by id.
    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<Test>, AppError>;

    /// Returns `None` when the test does not exist.
    async fn update_test(&self, id: i64, update: TestUpdate) -> Result<Option<Test>, AppError>;

    /// Returns `false` when the test does not exist.
    async fn delete_test(&self, id: i64) -> Result<bool, AppError>;
}

/// Append-only store of scored submissions.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn insert_record(&self, record: NewScoreRecord) -> Result<ScoreRecord, AppError>;

    /// Matching records ordered by id (oldest first).
    async fn list_records(&self, filter: ScoreFilter) -> Result<Vec<ScoreRecord>, AppError>;
}

/// A submission ready to be written.
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: NewScoreRecord,
    pub submitted_at: DateTime<Utc>,
    pub allow_resubmission: bool,
}

impl Submission {
    pub fn appearance(&self) -> Appearance {
        Appearance {
            student_id: self.record.student_id,
            name: self.record.name.clone(),
            email: self.record.email.clone(),
            prn: self.record.prn.clone(),
            marks_obtained: self.record.marks_obtained,
            submitted_at: self.submitted_at,
        }
    }
}

/// The single write path that keeps score records and `appeared_students`
/// consistent.
#[async_trait]
pub trait SubmissionLedger: Send + Sync {
    /// Atomically inserts the score record, appends the appearance and
    /// recomputes the average. Nothing is written when it fails.
    ///
    /// Errors: `NotFound` when the test is gone, `Conflict` when the student
    /// already appeared and resubmission is disabled.
    async fn record_submission(&self, submission: Submission)
    -> Result<(ScoreRecord, Test), AppError>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: UserDirectory + TestRepository + ScoreRepository + SubmissionLedger {}

impl<T> Store for T where T: UserDirectory + TestRepository + ScoreRepository + SubmissionLedger {}

pub type SharedStore = Arc<dyn Store>;

/// How list reads report an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyResult {
    NotFound,
    EmptyList,
}

impl EmptyResult {
    pub fn from_config(config: &Config) -> Self {
        if config.empty_result_not_found {
            EmptyResult::NotFound
        } else {
            EmptyResult::EmptyList
        }
    }
}

/// Applies the empty-result policy to every list read.
pub fn require_any<T>(items: Vec<T>, message: &str, policy: EmptyResult) -> Result<Vec<T>, AppError> {
    if items.is_empty() && policy == EmptyResult::NotFound {
        return Err(AppError::NotFound(message.to_string()));
    }
    Ok(items)
}
