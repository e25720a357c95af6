//! Lesson scheduling models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: String,
    pub student_id: String,
    pub instructor_id: String,
    pub vehicle_id: Option<String>,
    pub lesson_type: String,
    pub status: String,
    pub scheduled_date: String,
    pub duration_minutes: i64,
    pub pickup_location: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub instructor_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLessonRequest {
    pub student_id: String,
    pub instructor_id: String,
    pub vehicle_id: Option<String>,
    pub lesson_type: String,
    pub scheduled_date: String,
    pub duration_minutes: Option<i64>,
    pub pickup_location: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLessonRequest {
    pub vehicle_id: Option<String>,
    pub lesson_type: Option<String>,
    pub status: Option<String>,
    pub scheduled_date: Option<String>,
    pub duration_minutes: Option<i64>,
    pub pickup_location: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub instructor_notes: Option<String>,
}

/// Filters for the lesson listing
#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    pub student_id: Option<String>,
    pub instructor_id: Option<String>,
    pub status: Option<String>,
    /// ISO date, inclusive lower bound on `scheduled_date`
    pub from: Option<String>,
    /// ISO date, inclusive upper bound on `scheduled_date`
    pub to: Option<String>,
}
