//! Lesson scheduling endpoints (admin only).

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    actions, resource_types, CreateLessonRequest, Lesson, LessonQuery, UpdateLessonRequest,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_date, validate_duration, validate_lesson_status, validate_lesson_type,
    validate_text, validate_uuid,
};

const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Validate a CreateLessonRequest
fn validate_create_request(req: &CreateLessonRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_uuid(&req.student_id, "student_id") {
        errors.add("student_id", &e);
    }

    if let Err(e) = validate_uuid(&req.instructor_id, "instructor_id") {
        errors.add("instructor_id", &e);
    }

    if let Some(vehicle_id) = &req.vehicle_id {
        if let Err(e) = validate_uuid(vehicle_id, "vehicle_id") {
            errors.add("vehicle_id", &e);
        }
    }

    if let Err(e) = validate_lesson_type(&req.lesson_type) {
        errors.add("lesson_type", &e);
    }

    if let Err(e) = validate_date(&req.scheduled_date, "scheduled_date") {
        errors.add("scheduled_date", &e);
    }

    if let Some(minutes) = req.duration_minutes {
        if let Err(e) = validate_duration(minutes) {
            errors.add("duration_minutes", &e);
        }
    }

    if let Some(location) = &req.pickup_location {
        if let Err(e) = validate_text(location, "pickup_location", 200) {
            errors.add("pickup_location", &e);
        }
    }

    if let Some(price) = req.price {
        if price <= 0.0 {
            errors.add("price", "Price must be positive");
        }
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    errors.finish()
}

/// Validate an UpdateLessonRequest
fn validate_update_request(req: &UpdateLessonRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(vehicle_id) = &req.vehicle_id {
        if let Err(e) = validate_uuid(vehicle_id, "vehicle_id") {
            errors.add("vehicle_id", &e);
        }
    }

    if let Some(lesson_type) = &req.lesson_type {
        if let Err(e) = validate_lesson_type(lesson_type) {
            errors.add("lesson_type", &e);
        }
    }

    if let Some(status) = &req.status {
        if let Err(e) = validate_lesson_status(status) {
            errors.add("status", &e);
        }
    }

    if let Some(date) = &req.scheduled_date {
        if let Err(e) = validate_date(date, "scheduled_date") {
            errors.add("scheduled_date", &e);
        }
    }

    if let Some(minutes) = req.duration_minutes {
        if let Err(e) = validate_duration(minutes) {
            errors.add("duration_minutes", &e);
        }
    }

    if let Some(location) = &req.pickup_location {
        if let Err(e) = validate_text(location, "pickup_location", 200) {
            errors.add("pickup_location", &e);
        }
    }

    if let Some(price) = req.price {
        if price <= 0.0 {
            errors.add("price", "Price must be positive");
        }
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    if let Some(notes) = &req.instructor_notes {
        if let Err(e) = validate_text(notes, "instructor_notes", 2000) {
            errors.add("instructor_notes", &e);
        }
    }

    errors.finish()
}

/// List lessons with optional filters, soonest first
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LessonQuery>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(student_id) = &query.student_id {
        validate_uuid(student_id, "student_id")
            .map_err(|e| ApiError::validation_field("student_id", e))?;
        conditions.push("student_id = ?".to_string());
        bindings.push(student_id.clone());
    }

    if let Some(instructor_id) = &query.instructor_id {
        validate_uuid(instructor_id, "instructor_id")
            .map_err(|e| ApiError::validation_field("instructor_id", e))?;
        conditions.push("instructor_id = ?".to_string());
        bindings.push(instructor_id.clone());
    }

    if let Some(status) = &query.status {
        validate_lesson_status(status).map_err(|e| ApiError::validation_field("status", e))?;
        conditions.push("status = ?".to_string());
        bindings.push(status.clone());
    }

    if let Some(from) = &query.from {
        validate_date(from, "from").map_err(|e| ApiError::validation_field("from", e))?;
        conditions.push("scheduled_date >= ?".to_string());
        bindings.push(from.clone());
    }

    if let Some(to) = &query.to {
        validate_date(to, "to").map_err(|e| ApiError::validation_field("to", e))?;
        conditions.push("scheduled_date <= ?".to_string());
        bindings.push(to.clone());
    }

    let mut sql = String::from("SELECT * FROM lessons");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY scheduled_date ASC");

    let mut q = sqlx::query_as::<_, Lesson>(&sql);
    for binding in &bindings {
        q = q.bind(binding);
    }

    let lessons = q.fetch_all(&state.db).await?;

    Ok(Json(lessons))
}

/// Get a single lesson
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lesson>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lesson_id") {
        return Err(ApiError::validation_field("lesson_id", e));
    }

    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

    Ok(Json(lesson))
}

/// Schedule a lesson. The student, instructor and vehicle must all exist.
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    // Verify the referenced rows exist so the error beats the FK constraint
    let student_exists: Option<(String,)> =
        sqlx::query_as("SELECT id FROM students WHERE id = ?")
            .bind(&req.student_id)
            .fetch_optional(&state.db)
            .await?;
    if student_exists.is_none() {
        return Err(ApiError::not_found("Student not found"));
    }

    let instructor_exists: Option<(String,)> =
        sqlx::query_as("SELECT id FROM instructors WHERE id = ?")
            .bind(&req.instructor_id)
            .fetch_optional(&state.db)
            .await?;
    if instructor_exists.is_none() {
        return Err(ApiError::not_found("Instructor not found"));
    }

    if let Some(vehicle_id) = &req.vehicle_id {
        let vehicle_exists: Option<(String,)> =
            sqlx::query_as("SELECT id FROM vehicles WHERE id = ?")
                .bind(vehicle_id)
                .fetch_optional(&state.db)
                .await?;
        if vehicle_exists.is_none() {
            return Err(ApiError::not_found("Vehicle not found"));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let duration = req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);

    sqlx::query(
        r#"
        INSERT INTO lessons (id, student_id, instructor_id, vehicle_id, lesson_type,
                             status, scheduled_date, duration_minutes, pickup_location,
                             price, notes, instructor_notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'scheduled', ?, ?, ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.student_id)
    .bind(&req.instructor_id)
    .bind(&req.vehicle_id)
    .bind(&req.lesson_type)
    .bind(&req.scheduled_date)
    .bind(duration)
    .bind(&req.pickup_location)
    .bind(req.price)
    .bind(&req.notes)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let label = format!("{} on {}", lesson.lesson_type, lesson.scheduled_date);
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::LESSON_CREATE,
        resource_types::LESSON,
        Some(&lesson.id),
        Some(&label),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    tracing::info!(
        lesson = %lesson.id,
        lesson_type = %lesson.lesson_type,
        date = %lesson.scheduled_date,
        "Lesson scheduled"
    );

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Update a lesson; absent fields keep their current value
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateLessonRequest>,
) -> Result<Json<Lesson>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lesson_id") {
        return Err(ApiError::validation_field("lesson_id", e));
    }

    // Validate request
    validate_update_request(&req)?;

    // Check if lesson exists
    let _existing = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

    if let Some(vehicle_id) = &req.vehicle_id {
        let vehicle_exists: Option<(String,)> =
            sqlx::query_as("SELECT id FROM vehicles WHERE id = ?")
                .bind(vehicle_id)
                .fetch_optional(&state.db)
                .await?;
        if vehicle_exists.is_none() {
            return Err(ApiError::not_found("Vehicle not found"));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE lessons SET
            vehicle_id = COALESCE(?, vehicle_id),
            lesson_type = COALESCE(?, lesson_type),
            status = COALESCE(?, status),
            scheduled_date = COALESCE(?, scheduled_date),
            duration_minutes = COALESCE(?, duration_minutes),
            pickup_location = COALESCE(?, pickup_location),
            price = COALESCE(?, price),
            notes = COALESCE(?, notes),
            instructor_notes = COALESCE(?, instructor_notes),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.vehicle_id)
    .bind(&req.lesson_type)
    .bind(&req.status)
    .bind(&req.scheduled_date)
    .bind(req.duration_minutes)
    .bind(&req.pickup_location)
    .bind(req.price)
    .bind(&req.notes)
    .bind(&req.instructor_notes)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let label = format!("{} on {}", lesson.lesson_type, lesson.scheduled_date);
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::LESSON_UPDATE,
        resource_types::LESSON,
        Some(&lesson.id),
        Some(&label),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(lesson))
}

/// Cancel a lesson for good (delete the row)
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lesson_id") {
        return Err(ApiError::validation_field("lesson_id", e));
    }

    // Get lesson before deleting for audit log
    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

    let result = sqlx::query("DELETE FROM lessons WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Lesson not found"));
    }

    // Log audit event
    let label = format!("{} on {}", lesson.lesson_type, lesson.scheduled_date);
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::LESSON_DELETE,
        resource_types::LESSON,
        Some(&lesson.id),
        Some(&label),
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

    fn valid_request() -> CreateLessonRequest {
        CreateLessonRequest {
            student_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            instructor_id: "550e8400-e29b-41d4-a716-446655440001".to_string(),
            vehicle_id: None,
            lesson_type: "practical".to_string(),
            scheduled_date: "2026-09-01T09:00:00Z".to_string(),
            duration_minutes: Some(90),
            pickup_location: Some("Piata Unirii".to_string()),
            price: Some(120.0),
            notes: None,
        }
    }

    #[test]
    fn test_create_validation_accepts_valid() {
        assert!(validate_create_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_create_validation_rejects_bad_type() {
        let req = CreateLessonRequest {
            lesson_type: "parallel-parking".to_string(),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_short_duration() {
        let req = CreateLessonRequest { duration_minutes: Some(5), ..valid_request() };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_bad_student_id() {
        let req = CreateLessonRequest {
            student_id: "not-a-uuid".to_string(),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_update_validation_rejects_bad_status() {
        let req = UpdateLessonRequest {
            vehicle_id: None,
            lesson_type: None,
            status: Some("postponed".to_string()),
            scheduled_date: None,
            duration_minutes: None,
            pickup_location: None,
            price: None,
            notes: None,
            instructor_notes: None,
        };
        assert!(validate_update_request(&req).is_err());
    }
}
