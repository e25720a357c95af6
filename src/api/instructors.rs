//! Instructor endpoints (admin only).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    actions, resource_types, serialize_lesson_types, CreateInstructorRequest, Instructor,
    InstructorResponse, UpdateInstructorRequest,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_name, validate_text, validate_url, validate_uuid};

fn validate_license_number(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("License number is required".to_string());
    }
    if trimmed.len() > 50 {
        return Err("License number must be at most 50 characters".to_string());
    }
    Ok(())
}

/// Validate a CreateInstructorRequest
fn validate_create_request(req: &CreateInstructorRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", &e);
    }

    if let Err(e) = validate_license_number(&req.license_number) {
        errors.add("license_number", &e);
    }

    if let Some(bio) = &req.bio {
        if let Err(e) = validate_text(bio, "bio", 2000) {
            errors.add("bio", &e);
        }
    }

    if let Err(e) = validate_url(&req.avatar_url, "avatar_url") {
        errors.add("avatar_url", &e);
    }

    if let Some(years) = req.years_of_experience {
        if !(0..=60).contains(&years) {
            errors.add("years_of_experience", "Years of experience must be between 0 and 60");
        }
    }

    if let Some(rate) = req.hourly_rate {
        if rate <= 0.0 {
            errors.add("hourly_rate", "Hourly rate must be positive");
        }
    }

    errors.finish()
}

/// Validate an UpdateInstructorRequest
fn validate_update_request(req: &UpdateInstructorRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", &e);
        }
    }

    if let Some(license_number) = &req.license_number {
        if let Err(e) = validate_license_number(license_number) {
            errors.add("license_number", &e);
        }
    }

    if let Some(bio) = &req.bio {
        if let Err(e) = validate_text(bio, "bio", 2000) {
            errors.add("bio", &e);
        }
    }

    if let Err(e) = validate_url(&req.avatar_url, "avatar_url") {
        errors.add("avatar_url", &e);
    }

    if let Some(years) = req.years_of_experience {
        if !(0..=60).contains(&years) {
            errors.add("years_of_experience", "Years of experience must be between 0 and 60");
        }
    }

    if let Some(rate) = req.hourly_rate {
        if rate <= 0.0 {
            errors.add("hourly_rate", "Hourly rate must be positive");
        }
    }

    errors.finish()
}

/// List all instructors, active first, then by name
pub async fn list_instructors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<InstructorResponse>>, ApiError> {
    let instructors = sqlx::query_as::<_, Instructor>(
        "SELECT * FROM instructors ORDER BY is_active DESC, name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(instructors.into_iter().map(Into::into).collect()))
}

/// Get a single instructor
pub async fn get_instructor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InstructorResponse>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "instructor_id") {
        return Err(ApiError::validation_field("instructor_id", e));
    }

    let instructor = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Instructor not found"))?;

    Ok(Json(instructor.into()))
}

/// Register a new instructor
pub async fn create_instructor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateInstructorRequest>,
) -> Result<(StatusCode, Json<InstructorResponse>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let specializations = serialize_lesson_types(&req.specializations);

    sqlx::query(
        r#"
        INSERT INTO instructors (id, name, license_number, bio, avatar_url,
                                 years_of_experience, hourly_rate, specializations,
                                 is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.license_number.trim())
    .bind(&req.bio)
    .bind(&req.avatar_url)
    .bind(req.years_of_experience.unwrap_or(0))
    .bind(req.hourly_rate)
    .bind(&specializations)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create instructor: {}", e);
        // Check for unique constraint violation
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("An instructor with this license number already exists")
        } else {
            ApiError::database("Failed to create instructor")
        }
    })?;

    let instructor = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::INSTRUCTOR_CREATE,
        resource_types::INSTRUCTOR,
        Some(&instructor.id),
        Some(&instructor.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    tracing::info!(instructor = %instructor.name, "Instructor registered");

    Ok((StatusCode::CREATED, Json(instructor.into())))
}

/// Update an instructor; absent fields keep their current value.
/// Passing an empty specializations array clears it.
pub async fn update_instructor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateInstructorRequest>,
) -> Result<Json<InstructorResponse>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "instructor_id") {
        return Err(ApiError::validation_field("instructor_id", e));
    }

    // Validate request
    validate_update_request(&req)?;

    // Check if instructor exists
    let _existing = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Instructor not found"))?;

    // Empty list becomes "[]" so COALESCE still applies the change
    let specializations = req
        .specializations
        .as_ref()
        .map(|s| serialize_lesson_types(s).unwrap_or_else(|| "[]".to_string()));

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE instructors SET
            name = COALESCE(?, name),
            license_number = COALESCE(?, license_number),
            bio = COALESCE(?, bio),
            avatar_url = COALESCE(?, avatar_url),
            years_of_experience = COALESCE(?, years_of_experience),
            hourly_rate = COALESCE(?, hourly_rate),
            specializations = COALESCE(?, specializations),
            is_active = COALESCE(?, is_active),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.license_number.as_deref().map(str::trim))
    .bind(&req.bio)
    .bind(&req.avatar_url)
    .bind(req.years_of_experience)
    .bind(req.hourly_rate)
    .bind(&specializations)
    .bind(req.is_active)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update instructor: {}", e);
        // Check for unique constraint violation
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("An instructor with this license number already exists")
        } else {
            ApiError::database("Failed to update instructor")
        }
    })?;

    let instructor = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::INSTRUCTOR_UPDATE,
        resource_types::INSTRUCTOR,
        Some(&instructor.id),
        Some(&instructor.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(instructor.into()))
}

/// Remove an instructor
pub async fn delete_instructor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "instructor_id") {
        return Err(ApiError::validation_field("instructor_id", e));
    }

    // Get instructor before deleting for audit log
    let instructor = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Instructor not found"))?;

    let result = sqlx::query("DELETE FROM instructors WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                ApiError::bad_request(
                    "Instructor has scheduled lessons; delete or reassign them first",
                )
            } else {
                ApiError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Instructor not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::INSTRUCTOR_DELETE,
        resource_types::INSTRUCTOR,
        Some(&instructor.id),
        Some(&instructor.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LessonType;

    fn valid_request() -> CreateInstructorRequest {
        CreateInstructorRequest {
            name: "Mihai Popescu".to_string(),
            license_number: "INS-0042".to_string(),
            bio: None,
            avatar_url: None,
            years_of_experience: Some(12),
            hourly_rate: Some(150.0),
            specializations: vec![LessonType::Practical, LessonType::TestPreparation],
        }
    }

    #[test]
    fn test_create_validation_accepts_valid() {
        assert!(validate_create_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_create_validation_requires_license_number() {
        let req = CreateInstructorRequest {
            license_number: "  ".to_string(),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_negative_rate() {
        let req = CreateInstructorRequest {
            hourly_rate: Some(-5.0),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_update_validation_rejects_absurd_experience() {
        let req = UpdateInstructorRequest {
            name: None,
            license_number: None,
            bio: None,
            avatar_url: None,
            years_of_experience: Some(75),
            hourly_rate: None,
            specializations: None,
            is_active: None,
        };
        assert!(validate_update_request(&req).is_err());
    }
}
