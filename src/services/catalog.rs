// src/services/catalog.rs

use validator::Validate;

use crate::{
    error::AppError,
    models::{
        test::{
            NewTest, StudentRef, Test, TestDefinition, TestDefinitionRequest, TestUpdate,
            compute_total_marks,
        },
        user::ROLE_ADMIN,
    },
    services::answer_key,
    store::{EmptyResult, Store, TestFilter, TestRepository, UserDirectory, require_any},
};

/// Checks the request shape and splits it into the definition and the
/// optional allocation list (deduplicated, first-seen order).
pub fn parse_definition(
    req: TestDefinitionRequest,
) -> Result<(TestDefinition, Option<Vec<i64>>), AppError> {
    req.validate()?;

    let students = match req.students {
        Some(refs) if !refs.is_empty() => Some(resolve_students(&refs)?),
        _ => None,
    };

    // `validate` guarantees the required fields are present.
    let missing = |field: &str| AppError::BadRequest(format!("{} is required.", field));

    let definition = TestDefinition {
        name: req.test_name.ok_or_else(|| missing("testName"))?,
        subject: req.subject,
        owner_name: req.teacher_name.filter(|n| !n.trim().is_empty()),
        scheduled_date: req.test_date.ok_or_else(|| missing("testDate"))?,
        scheduled_time: req.test_time.ok_or_else(|| missing("testTime"))?,
        creation_date: req.test_creation_date.filter(|d| !d.trim().is_empty()),
        duration_minutes: req.duration.ok_or_else(|| missing("duration"))?,
        instructions: req.instructions.ok_or_else(|| missing("instructions"))?,
        questions: req.questions.ok_or_else(|| missing("questions"))?,
        marks_per_question: req
            .marks_per_question
            .ok_or_else(|| missing("marksPerQuestion"))?,
        passing_marks: req.passing_marks,
        department: req.department,
        year: req.year,
    };

    Ok((definition, students))
}

fn resolve_students(refs: &[StudentRef]) -> Result<Vec<i64>, AppError> {
    let mut ids: Vec<i64> = Vec::with_capacity(refs.len());
    for student in refs {
        let id = student
            .resolve()
            .ok_or(AppError::BadRequest("Invalid student id.".to_string()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Creates a test owned by `owner_id` with empty appearances.
pub async fn create_test(
    store: &dyn Store,
    owner_id: i64,
    definition: TestDefinition,
    allocated_students: Vec<i64>,
) -> Result<Test, AppError> {
    let owner = store
        .find_user(owner_id)
        .await?
        .ok_or(AppError::NotFound("Teacher not found.".to_string()))?;

    let creation_date = definition
        .creation_date
        .ok_or(AppError::BadRequest("testCreationDate is required.".to_string()))?;

    if allocated_students.is_empty() {
        return Err(AppError::BadRequest(
            "At least one student must be allocated.".to_string(),
        ));
    }

    let questions = answer_key::validate(&definition.questions)?;
    let total_marks = compute_total_marks(&questions, definition.marks_per_question);

    let test = store
        .insert_test(NewTest {
            owner_id,
            owner_name: definition.owner_name.unwrap_or(owner.name),
            subject: definition.subject,
            name: definition.name,
            scheduled_date: definition.scheduled_date,
            scheduled_time: definition.scheduled_time,
            creation_date,
            duration_minutes: definition.duration_minutes,
            instructions: definition.instructions,
            questions,
            passing_marks: definition.passing_marks.unwrap_or(0.0),
            marks_per_question: definition.marks_per_question,
            total_marks,
            allocated_students,
            department: definition.department,
            year: definition.year,
        })
        .await?;

    tracing::info!(
        "Test {} created by teacher {} ({} questions, {} students)",
        test.id,
        owner_id,
        test.questions.len(),
        test.allocated_students.len()
    );

    Ok(test)
}

/// Overwrites a test's metadata and questions.
///
/// Omitted optional fields (subject, passing marks, department, year) and an
/// omitted or empty allocation keep their current values; appearances and
/// the average are never touched here.
pub async fn edit_test(
    store: &dyn Store,
    test_id: i64,
    definition: TestDefinition,
    allocated_students: Option<Vec<i64>>,
) -> Result<Test, AppError> {
    let existing = get_by_id(store, test_id).await?;

    let questions = answer_key::validate(&definition.questions)?;
    let total_marks = compute_total_marks(&questions, definition.marks_per_question);

    let allocated_students = allocated_students
        .filter(|s| !s.is_empty())
        .unwrap_or(existing.allocated_students);

    let test = store
        .update_test(
            test_id,
            TestUpdate {
                owner_name: definition.owner_name.unwrap_or(existing.owner_name),
                subject: definition.subject.or(existing.subject),
                name: definition.name,
                scheduled_date: definition.scheduled_date,
                scheduled_time: definition.scheduled_time,
                duration_minutes: definition.duration_minutes,
                instructions: definition.instructions,
                questions,
                passing_marks: definition.passing_marks.unwrap_or(existing.passing_marks),
                marks_per_question: definition.marks_per_question,
                total_marks,
                allocated_students,
                department: definition.department.or(existing.department),
                year: definition.year.or(existing.year),
            },
        )
        .await?
        .ok_or(AppError::NotFound("Test not found.".to_string()))?;

    tracing::info!("Test {} updated", test_id);
    Ok(test)
}

/// Removes a test. Score records that reference it are left in place.
pub async fn delete_test(store: &dyn Store, test_id: i64) -> Result<(), AppError> {
    if !store.delete_test(test_id).await? {
        return Err(AppError::NotFound("Test not found.".to_string()));
    }
    tracing::info!("Test {} deleted", test_id);
    Ok(())
}

pub async fn get_by_id(store: &dyn Store, test_id: i64) -> Result<Test, AppError> {
    store
        .find_test(test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found.".to_string()))
}

pub async fn list_all(store: &dyn Store, policy: EmptyResult) -> Result<Vec<Test>, AppError> {
    let tests = store.list_tests(TestFilter::All).await?;
    require_any(tests, "No tests found.", policy)
}

pub async fn list_by_owner(
    store: &dyn Store,
    owner_id: i64,
    policy: EmptyResult,
) -> Result<Vec<Test>, AppError> {
    let tests = store.list_tests(TestFilter::Owner(owner_id)).await?;
    require_any(tests, "No tests found for this teacher.", policy)
}

pub async fn list_for_student(
    store: &dyn Store,
    student_id: i64,
    policy: EmptyResult,
) -> Result<Vec<Test>, AppError> {
    let tests = store.list_tests(TestFilter::AllocatedTo(student_id)).await?;
    require_any(tests, "No tests found for this student.", policy)
}

/// Only the owning teacher or an admin may change or remove a test.
pub fn ensure_manager(test: &Test, caller_id: i64, caller_role: &str) -> Result<(), AppError> {
    if test.owner_id == caller_id || caller_role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the test owner or an admin can modify this test.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{score_record::NewScoreRecord, user::UserProfile},
        store::{MemoryStore, ScoreFilter, ScoreRepository},
    };
    use serde_json::json;

    const TEACHER: i64 = 1;

    async fn store_with_teacher() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_user(UserProfile {
                id: TEACHER,
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                prn: String::new(),
                role: "teacher".to_string(),
            })
            .await;
        store
    }

    fn request(body: serde_json::Value) -> TestDefinitionRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "testName": "Algebra I",
            "duration": 45,
            "subject": "Maths",
            "instructions": "Answer everything.",
            "testDate": "2025-03-01",
            "testTime": "09:30",
            "testCreationDate": "2025-02-20",
            "marksPerQuestion": 2,
            "questions": [
                {"type": "mcq", "question": "1 + 1?", "options": ["1", "2", "3", "4"], "correctAnswer": "B", "marks": 5},
                {"type": "mcq", "question": "2 + 2?", "options": ["3", "4", "5", "6"], "correctAnswer": "B", "marks": "5"}
            ],
            "students": [10, 11]
        })
    }

    async fn create(store: &MemoryStore, body: serde_json::Value) -> Result<Test, AppError> {
        let (definition, students) = parse_definition(request(body))?;
        create_test(store, TEACHER, definition, students.unwrap_or_default()).await
    }

    #[tokio::test]
    async fn create_computes_total_marks() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();

        assert_eq!(test.total_marks, 10.0);
        assert_eq!(test.questions[0].correct_answer, "2");
        assert_eq!(test.allocated_students, vec![10, 11]);
        assert!(test.appeared_students.is_empty());
        assert_eq!(test.average_score, 0.0);
        assert_eq!(test.owner_name, "Ada");
    }

    #[tokio::test]
    async fn unset_points_use_marks_per_question() {
        let store = store_with_teacher().await;
        let mut body = valid_body();
        body["questions"][1]["marks"] = json!(null);
        let test = create(&store, body).await.unwrap();
        assert_eq!(test.total_marks, 7.0);
    }

    #[tokio::test]
    async fn create_rejects_bad_answer_letter() {
        let store = store_with_teacher().await;
        let mut body = valid_body();
        body["questions"][0]["correctAnswer"] = json!("E");

        let result = create(&store, body).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(store.list_tests(TestFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_requires_students_and_fields() {
        let store = store_with_teacher().await;

        let mut no_students = valid_body();
        no_students["students"] = json!([]);
        assert!(matches!(create(&store, no_students).await, Err(AppError::BadRequest(_))));

        let mut no_name = valid_body();
        no_name.as_object_mut().unwrap().remove("testName");
        assert!(matches!(create(&store, no_name).await, Err(AppError::BadRequest(_))));

        let mut no_questions = valid_body();
        no_questions["questions"] = json!([]);
        assert!(matches!(create(&store, no_questions).await, Err(AppError::BadRequest(_))));

        let mut no_creation_date = valid_body();
        no_creation_date.as_object_mut().unwrap().remove("testCreationDate");
        assert!(matches!(
            create(&store, no_creation_date).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn create_requires_known_owner() {
        let store = MemoryStore::new();
        let result = create(&store, valid_body()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn edit_without_students_keeps_allocation() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();

        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("students");
        body["testName"] = json!("Algebra II");
        let (definition, students) = parse_definition(request(body)).unwrap();
        assert!(students.is_none());

        let edited = edit_test(&store, test.id, definition, students).await.unwrap();
        assert_eq!(edited.name, "Algebra II");
        assert_eq!(edited.allocated_students, test.allocated_students);
    }

    #[tokio::test]
    async fn edit_keeps_metadata_left_out_of_the_request() {
        let store = store_with_teacher().await;
        let mut body = valid_body();
        body["passingMarks"] = json!(4);
        body["department"] = json!("CSE");
        body["year"] = json!("2");
        let test = create(&store, body).await.unwrap();

        let mut body = valid_body();
        for key in ["subject", "passingMarks", "department", "year", "students"] {
            body.as_object_mut().unwrap().remove(key);
        }
        let (definition, students) = parse_definition(request(body)).unwrap();
        let edited = edit_test(&store, test.id, definition, students).await.unwrap();

        assert_eq!(edited.passing_marks, 4.0);
        assert_eq!(edited.subject.as_deref(), Some("Maths"));
        assert_eq!(edited.department.as_deref(), Some("CSE"));
        assert_eq!(edited.year.as_deref(), Some("2"));
        assert_eq!(edited.allocated_students, vec![10, 11]);

        let mut body = valid_body();
        body["passingMarks"] = json!(6);
        body["department"] = json!("ECE");
        let (definition, students) = parse_definition(request(body)).unwrap();
        let edited = edit_test(&store, test.id, definition, students).await.unwrap();
        assert_eq!(edited.passing_marks, 6.0);
        assert_eq!(edited.department.as_deref(), Some("ECE"));
    }

    #[tokio::test]
    async fn instructions_are_stored_as_written() {
        let store = store_with_teacher().await;
        let mut body = valid_body();
        body["instructions"] = json!("Use Vec<T> only; a && b must hold.");
        let test = create(&store, body).await.unwrap();
        assert_eq!(test.instructions, "Use Vec<T> only; a && b must hold.");
    }

    #[tokio::test]
    async fn edit_is_idempotent_on_total_marks() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();

        let mut totals = Vec::new();
        for _ in 0..2 {
            let (definition, students) = parse_definition(request(valid_body())).unwrap();
            let edited = edit_test(&store, test.id, definition, students).await.unwrap();
            totals.push(edited.total_marks);
        }
        assert_eq!(totals, vec![10.0, 10.0]);
    }

    #[tokio::test]
    async fn edit_replaces_allocation_when_given() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();

        let mut body = valid_body();
        body["students"] = json!([12, {"_id": 12}, "13"]);
        let (definition, students) = parse_definition(request(body)).unwrap();
        let edited = edit_test(&store, test.id, definition, students).await.unwrap();
        assert_eq!(edited.allocated_students, vec![12, 13]);
    }

    #[tokio::test]
    async fn edit_missing_test_is_not_found() {
        let store = store_with_teacher().await;
        let (definition, students) = parse_definition(request(valid_body())).unwrap();
        let result = edit_test(&store, 404, definition, students).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_keeps_score_records() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();
        store
            .insert_record(NewScoreRecord {
                student_id: 10,
                test_id: test.id,
                name: "Sam".to_string(),
                email: String::new(),
                prn: String::new(),
                marks_obtained: 5.0,
                answers: Vec::new(),
            })
            .await
            .unwrap();

        delete_test(&store, test.id).await.unwrap();

        assert!(matches!(get_by_id(&store, test.id).await, Err(AppError::NotFound(_))));
        assert_eq!(
            store.list_records(ScoreFilter::Test(test.id)).await.unwrap().len(),
            1
        );
        assert!(matches!(delete_test(&store, test.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_listings_follow_policy() {
        let store = store_with_teacher().await;
        assert!(matches!(
            list_all(&store, EmptyResult::NotFound).await,
            Err(AppError::NotFound(_))
        ));
        assert!(list_all(&store, EmptyResult::EmptyList).await.unwrap().is_empty());

        create(&store, valid_body()).await.unwrap();
        assert_eq!(list_by_owner(&store, TEACHER, EmptyResult::NotFound).await.unwrap().len(), 1);
        assert_eq!(list_for_student(&store, 11, EmptyResult::NotFound).await.unwrap().len(), 1);
        assert!(matches!(
            list_for_student(&store, 99, EmptyResult::NotFound).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_owner_or_admin_manage_tests() {
        let store = store_with_teacher().await;
        let test = create(&store, valid_body()).await.unwrap();

        assert!(ensure_manager(&test, TEACHER, "teacher").is_ok());
        assert!(ensure_manager(&test, 77, "admin").is_ok());
        assert!(matches!(
            ensure_manager(&test, 77, "teacher"),
            Err(AppError::Forbidden(_))
        ));
    }
}
