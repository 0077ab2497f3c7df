// src/services/scores.rs

use crate::{
    error::AppError,
    models::score_record::{NewScoreRecord, ScoreRecord},
    store::{EmptyResult, ScoreFilter, ScoreRepository, Store, require_any},
};

const NOT_FOUND: &str = "Marks not found";

/// Stores a record outside the submission flow (imports, backfills).
pub async fn create(store: &dyn Store, record: NewScoreRecord) -> Result<ScoreRecord, AppError> {
    store.insert_record(record).await
}

pub async fn find_by_student(
    store: &dyn Store,
    student_id: i64,
    policy: EmptyResult,
) -> Result<Vec<ScoreRecord>, AppError> {
    let records = store.list_records(ScoreFilter::Student(student_id)).await?;
    require_any(records, NOT_FOUND, policy)
}

pub async fn find_by_test(
    store: &dyn Store,
    test_id: i64,
    policy: EmptyResult,
) -> Result<Vec<ScoreRecord>, AppError> {
    let records = store.list_records(ScoreFilter::Test(test_id)).await?;
    require_any(records, NOT_FOUND, policy)
}

/// The student's most recent record for the test.
pub async fn find_one(
    store: &dyn Store,
    student_id: i64,
    test_id: i64,
) -> Result<ScoreRecord, AppError> {
    store
        .list_records(ScoreFilter::StudentAndTest {
            student_id,
            test_id,
        })
        .await?
        .pop()
        .ok_or(AppError::NotFound(NOT_FOUND.to_string()))
}
