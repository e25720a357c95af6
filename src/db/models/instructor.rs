//! Instructor models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{parse_lesson_types, LessonType};

/// Row as stored. `specializations` is a JSON array of lesson types.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Instructor {
    pub id: String,
    pub name: String,
    pub license_number: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub years_of_experience: i64,
    pub hourly_rate: Option<f64>,
    pub specializations: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Instructor as returned by the API, with specializations decoded.
#[derive(Debug, Clone, Serialize)]
pub struct InstructorResponse {
    pub id: String,
    pub name: String,
    pub license_number: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub years_of_experience: i64,
    pub hourly_rate: Option<f64>,
    pub specializations: Vec<LessonType>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Instructor> for InstructorResponse {
    fn from(row: Instructor) -> Self {
        let specializations = parse_lesson_types(row.specializations.as_deref());
        Self {
            id: row.id,
            name: row.name,
            license_number: row.license_number,
            bio: row.bio,
            avatar_url: row.avatar_url,
            years_of_experience: row.years_of_experience,
            hourly_rate: row.hourly_rate,
            specializations,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInstructorRequest {
    pub name: String,
    pub license_number: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub years_of_experience: Option<i64>,
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub specializations: Vec<LessonType>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInstructorRequest {
    pub name: Option<String>,
    pub license_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub years_of_experience: Option<i64>,
    pub hourly_rate: Option<f64>,
    pub specializations: Option<Vec<LessonType>>,
    pub is_active: Option<bool>,
}
