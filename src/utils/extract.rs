// src/utils/extract.rs

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` with rejections reported as `AppError::BadRequest`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
