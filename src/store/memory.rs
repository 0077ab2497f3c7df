// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::{Mutex, RwLock};

use crate::{
    error::AppError,
    models::{
        score_record::{NewScoreRecord, ScoreRecord},
        test::{NewTest, Test, TestUpdate},
        user::UserProfile,
    },
    store::{
        ScoreFilter, ScoreRepository, Submission, SubmissionLedger, TestFilter, TestRepository,
        UserDirectory,
    },
};

/// In-process backend.
///
/// Each test sits behind its own mutex so submissions to one test are
/// serialized while other tests stay independent.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, UserProfile>>,
    tests: RwLock<HashMap<i64, Arc<Mutex<Test>>>>,
    records: RwLock<Vec<ScoreRecord>>,
    next_test_id: AtomicI64,
    next_record_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, standing in for the account service.
    pub async fn insert_user(&self, user: UserProfile) {
        self.users.write().await.insert(user.id, user);
    }

    async fn test_entry(&self, id: i64) -> Option<Arc<Mutex<Test>>> {
        self.tests.read().await.get(&id).cloned()
    }

    async fn push_record(&self, record: NewScoreRecord) -> ScoreRecord {
        let stored = ScoreRecord {
            id: self.next_record_id.fetch_add(1, Ordering::SeqCst) + 1,
            student_id: record.student_id,
            test_id: record.test_id,
            name: record.name,
            email: record.email,
            prn: record.prn,
            marks_obtained: record.marks_obtained,
            answers: Json(record.answers),
            created_at: Utc::now(),
        };
        self.records.write().await.push(stored.clone());
        stored
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl TestRepository for MemoryStore {
    async fn insert_test(&self, test: NewTest) -> Result<Test, AppError> {
        let now = Utc::now();
        let stored = Test {
            id: self.next_test_id.fetch_add(1, Ordering::SeqCst) + 1,
            owner_id: test.owner_id,
            owner_name: test.owner_name,
            subject: test.subject,
            name: test.name,
            scheduled_date: test.scheduled_date,
            scheduled_time: test.scheduled_time,
            creation_date: test.creation_date,
            duration_minutes: test.duration_minutes,
            instructions: test.instructions,
            questions: Json(test.questions),
            passing_marks: test.passing_marks,
            marks_per_question: test.marks_per_question,
            total_marks: test.total_marks,
            allocated_students: test.allocated_students,
            appeared_students: Json(Vec::new()),
            average_score: 0.0,
            department: test.department,
            year: test.year,
            created_at: now,
            updated_at: now,
        };

        self.tests
            .write()
            .await
            .insert(stored.id, Arc::new(Mutex::new(stored.clone())));
        Ok(stored)
    }

    async fn find_test(&self, id: i64) -> Result<Option<Test>, AppError> {
        match self.test_entry(id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<Test>, AppError> {
        let entries: Vec<Arc<Mutex<Test>>> = self.tests.read().await.values().cloned().collect();

        let mut tests = Vec::new();
        for entry in entries {
            let test = entry.lock().await;
            if filter.matches(&test) {
                tests.push(test.clone());
            }
        }
        tests.sort_by_key(|t| t.id);
        Ok(tests)
    }

    async fn update_test(&self, id: i64, update: TestUpdate) -> Result<Option<Test>, AppError> {
        let Some(entry) = self.test_entry(id).await else {
            return Ok(None);
        };

        let mut test = entry.lock().await;
        test.owner_name = update.owner_name;
        test.subject = update.subject;
        test.name = update.name;
        test.scheduled_date = update.scheduled_date;
        test.scheduled_time = update.scheduled_time;
        test.duration_minutes = update.duration_minutes;
        test.instructions = update.instructions;
        test.questions = Json(update.questions);
        test.passing_marks = update.passing_marks;
        test.marks_per_question = update.marks_per_question;
        test.total_marks = update.total_marks;
        test.allocated_students = update.allocated_students;
        test.department = update.department;
        test.year = update.year;
        test.updated_at = Utc::now();

        Ok(Some(test.clone()))
    }

    async fn delete_test(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tests.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ScoreRepository for MemoryStore {
    async fn insert_record(&self, record: NewScoreRecord) -> Result<ScoreRecord, AppError> {
        Ok(self.push_record(record).await)
    }

    async fn list_records(&self, filter: ScoreFilter) -> Result<Vec<ScoreRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubmissionLedger for MemoryStore {
    async fn record_submission(
        &self,
        submission: Submission,
    ) -> Result<(ScoreRecord, Test), AppError> {
        let entry = self
            .test_entry(submission.record.test_id)
            .await
            .ok_or(AppError::NotFound("Test not found".to_string()))?;

        // Held until the appearance is written; this is the per-test lock.
        let mut test = entry.lock().await;

        if !submission.allow_resubmission && test.has_appeared(submission.record.student_id) {
            return Err(AppError::Conflict(
                "Test already submitted by this student".to_string(),
            ));
        }

        let appearance = submission.appearance();
        let record = self.push_record(submission.record).await;
        test.record_appearance(appearance);
        test.updated_at = Utc::now();

        Ok((record, test.clone()))
    }
}
