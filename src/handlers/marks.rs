// src/handlers/marks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    config::Config,
    error::AppError,
    services::scores,
    store::{EmptyResult, SharedStore},
    utils::jwt::Claims,
};

/// All score records of the calling student.
pub async fn my_marks(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let records =
        scores::find_by_student(&*store, student_id, EmptyResult::from_config(&config)).await?;
    Ok(Json(records))
}

/// The calling student's latest record for one test.
pub async fn current_marks(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let record = scores::find_one(&*store, student_id, test_id).await?;
    Ok(Json(record))
}

/// Every record submitted for a test, including tests since deleted.
pub async fn marks_for_test(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let records =
        scores::find_by_test(&*store, test_id, EmptyResult::from_config(&config)).await?;
    Ok(Json(records))
}
