// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};

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

const TEST_COLUMNS: &str = r#"
    id, owner_id, owner_name, subject, name, scheduled_date, scheduled_time,
    creation_date, duration_minutes, instructions, questions, passing_marks,
    marks_per_question, total_marks, allocated_students, appeared_students,
    average_score, department, year, created_at, updated_at
"#;

const RECORD_COLUMNS: &str = r#"
    id, student_id, test_id, name, email, prn, marks_obtained, answers, created_at
"#;

/// Postgres backend. Submissions lock the test row with `FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects, retrying while the database comes up.
    pub async fn connect_with_retry(
        database_url: &str,
        max_retries: u32,
    ) -> Result<Self, sqlx::Error> {
        let mut retry_count = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => return Ok(Self::new(pool)),
                Err(e) if retry_count < max_retries => {
                    retry_count += 1;
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {}): {}",
                        retry_count,
                        e
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: i64) -> Result<Option<UserProfile>, AppError> {
        let user = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, email, prn, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up user {}: {:?}", id, e);
            AppError::from(e)
        })?;

        Ok(user)
    }
}

#[async_trait]
impl TestRepository for PgStore {
    async fn insert_test(&self, test: NewTest) -> Result<Test, AppError> {
        let sql = format!(
            r#"
            INSERT INTO tests
            (owner_id, owner_name, subject, name, scheduled_date, scheduled_time,
             creation_date, duration_minutes, instructions, questions, passing_marks,
             marks_per_question, total_marks, allocated_students, department, year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TEST_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Test>(&sql)
            .bind(test.owner_id)
            .bind(test.owner_name)
            .bind(test.subject)
            .bind(test.name)
            .bind(test.scheduled_date)
            .bind(test.scheduled_time)
            .bind(test.creation_date)
            .bind(test.duration_minutes)
            .bind(test.instructions)
            .bind(Json(test.questions))
            .bind(test.passing_marks)
            .bind(test.marks_per_question)
            .bind(test.total_marks)
            .bind(test.allocated_students)
            .bind(test.department)
            .bind(test.year)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create test: {:?}", e);
                AppError::from(e)
            })?;

        Ok(created)
    }

    async fn find_test(&self, id: i64) -> Result<Option<Test>, AppError> {
        let sql = format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1");
        let test = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch test {}: {:?}", id, e);
                AppError::from(e)
            })?;
        Ok(test)
    }

    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<Test>, AppError> {
        let tests = match filter {
            TestFilter::All => {
                let sql = format!("SELECT {TEST_COLUMNS} FROM tests ORDER BY id");
                sqlx::query_as::<_, Test>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
            TestFilter::Owner(owner_id) => {
                let sql = format!("SELECT {TEST_COLUMNS} FROM tests WHERE owner_id = $1 ORDER BY id");
                sqlx::query_as::<_, Test>(&sql)
                    .bind(owner_id)
                    .fetch_all(&self.pool)
                    .await
            }
            TestFilter::AllocatedTo(student_id) => {
                let sql = format!(
                    "SELECT {TEST_COLUMNS} FROM tests WHERE $1 = ANY(allocated_students) ORDER BY id"
                );
                sqlx::query_as::<_, Test>(&sql)
                    .bind(student_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            tracing::error!("Failed to list tests ({:?}): {:?}", filter, e);
            AppError::from(e)
        })?;

        Ok(tests)
    }

    async fn update_test(&self, id: i64, update: TestUpdate) -> Result<Option<Test>, AppError> {
        let sql = format!(
            r#"
            UPDATE tests SET
                owner_name = $2,
                subject = $3,
                name = $4,
                scheduled_date = $5,
                scheduled_time = $6,
                duration_minutes = $7,
                instructions = $8,
                questions = $9,
                passing_marks = $10,
                marks_per_question = $11,
                total_marks = $12,
                allocated_students = $13,
                department = $14,
                year = $15,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .bind(update.owner_name)
            .bind(update.subject)
            .bind(update.name)
            .bind(update.scheduled_date)
            .bind(update.scheduled_time)
            .bind(update.duration_minutes)
            .bind(update.instructions)
            .bind(Json(update.questions))
            .bind(update.passing_marks)
            .bind(update.marks_per_question)
            .bind(update.total_marks)
            .bind(update.allocated_students)
            .bind(update.department)
            .bind(update.year)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update test {}: {:?}", id, e);
                AppError::from(e)
            })?;

        Ok(updated)
    }

    async fn delete_test(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete test {}: {:?}", id, e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScoreRepository for PgStore {
    async fn insert_record(&self, record: NewScoreRecord) -> Result<ScoreRecord, AppError> {
        let mut conn = self.pool.acquire().await?;
        let created = insert_record(&mut conn, record).await?;
        Ok(created)
    }

    async fn list_records(&self, filter: ScoreFilter) -> Result<Vec<ScoreRecord>, AppError> {
        let records = match filter {
            ScoreFilter::Student(student_id) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM score_records WHERE student_id = $1 ORDER BY id"
                );
                sqlx::query_as::<_, ScoreRecord>(&sql)
                    .bind(student_id)
                    .fetch_all(&self.pool)
                    .await
            }
            ScoreFilter::Test(test_id) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM score_records WHERE test_id = $1 ORDER BY id"
                );
                sqlx::query_as::<_, ScoreRecord>(&sql)
                    .bind(test_id)
                    .fetch_all(&self.pool)
                    .await
            }
            ScoreFilter::StudentAndTest {
                student_id,
                test_id,
            } => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM score_records \
                     WHERE student_id = $1 AND test_id = $2 ORDER BY id"
                );
                sqlx::query_as::<_, ScoreRecord>(&sql)
                    .bind(student_id)
                    .bind(test_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            tracing::error!("Failed to fetch score records ({:?}): {:?}", filter, e);
            AppError::from(e)
        })?;

        Ok(records)
    }
}

async fn insert_record(
    conn: &mut sqlx::PgConnection,
    record: NewScoreRecord,
) -> Result<ScoreRecord, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO score_records
        (student_id, test_id, name, email, prn, marks_obtained, answers)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {RECORD_COLUMNS}
        "#
    );

    sqlx::query_as::<_, ScoreRecord>(&sql)
        .bind(record.student_id)
        .bind(record.test_id)
        .bind(record.name)
        .bind(record.email)
        .bind(record.prn)
        .bind(record.marks_obtained)
        .bind(Json(record.answers))
        .fetch_one(&mut *conn)
        .await
}

#[async_trait]
impl SubmissionLedger for PgStore {
    async fn record_submission(
        &self,
        submission: Submission,
    ) -> Result<(ScoreRecord, Test), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        // 1. Lock the test row; concurrent submissions to this test queue here.
        let sql = format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1 FOR UPDATE");
        let mut test = sqlx::query_as::<_, Test>(&sql)
            .bind(submission.record.test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Test not found".to_string()))?;

        if !submission.allow_resubmission && test.has_appeared(submission.record.student_id) {
            return Err(AppError::Conflict(
                "Test already submitted by this student".to_string(),
            ));
        }

        // 2. Persist the detailed record.
        let appearance = submission.appearance();
        let record = insert_record(&mut tx, submission.record).await.map_err(|e| {
            tracing::error!("Failed to insert score record: {:?}", e);
            AppError::from(e)
        })?;

        // 3. Append the summary and write back the recomputed average.
        test.record_appearance(appearance);
        let sql = format!(
            r#"
            UPDATE tests SET
                appeared_students = $2,
                average_score = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Test>(&sql)
            .bind(test.id)
            .bind(&test.appeared_students)
            .bind(test.average_score)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to record appearance on test {}: {:?}", test.id, e);
                AppError::from(e)
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok((record, updated))
    }
}
