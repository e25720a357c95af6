//! Student roster models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub status: String,
    pub year: i64,
    pub passed: bool,
    pub theory_test_passed: bool,
    pub practical_test_passed: bool,
    pub lessons_completed: i64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub status: Option<String>,
    pub year: Option<i64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub status: Option<String>,
    pub year: Option<i64>,
    pub passed: Option<bool>,
    pub theory_test_passed: Option<bool>,
    pub practical_test_passed: Option<bool>,
    pub lessons_completed: Option<i64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}
