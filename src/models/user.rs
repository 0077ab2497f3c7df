// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";

/// Read-only view of a row in the account service's 'users' table.
/// Passwords and profile extras never reach the assessment core.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,

    pub name: String,

    pub email: String,

    /// Permanent registration number.
    pub prn: String,

    /// 'student', 'teacher' or 'admin'.
    pub role: String,
}
