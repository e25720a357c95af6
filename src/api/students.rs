//! Student roster endpoints (admin only).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Datelike;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    actions, resource_types, CreateStudentRequest, Student, UpdateStudentRequest,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::events::{publish, ChangeEvent};
use super::validation::{
    validate_name, validate_optional_email, validate_optional_phone, validate_text,
    validate_uuid, validate_year,
};

/// Validate a CreateStudentRequest
fn validate_create_request(req: &CreateStudentRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", &e);
    }

    if let Some(status) = &req.status {
        if let Err(e) = validate_text(status, "status", 50) {
            errors.add("status", &e);
        }
    }

    if let Some(year) = req.year {
        if let Err(e) = validate_year(year, "year") {
            errors.add("year", &e);
        }
    }

    if let Err(e) = validate_optional_phone(&req.phone) {
        errors.add("phone", &e);
    }

    if let Err(e) = validate_optional_email(&req.email) {
        errors.add("email", &e);
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    errors.finish()
}

/// Validate an UpdateStudentRequest
fn validate_update_request(req: &UpdateStudentRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", &e);
        }
    }

    if let Some(status) = &req.status {
        if let Err(e) = validate_text(status, "status", 50) {
            errors.add("status", &e);
        }
    }

    if let Some(year) = req.year {
        if let Err(e) = validate_year(year, "year") {
            errors.add("year", &e);
        }
    }

    if let Some(count) = req.lessons_completed {
        if count < 0 {
            errors.add("lessons_completed", "Lesson count cannot be negative");
        }
    }

    if let Err(e) = validate_optional_phone(&req.phone) {
        errors.add("phone", &e);
    }

    if let Err(e) = validate_optional_email(&req.email) {
        errors.add("email", &e);
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    errors.finish()
}

/// List the whole roster, newest cohort first
pub async fn list_students(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT * FROM students ORDER BY year DESC, name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(students))
}

/// Get a single student
pub async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Student>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "student_id") {
        return Err(ApiError::validation_field("student_id", e));
    }

    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(Json(student))
}

/// Add a student to the roster
pub async fn create_student(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let year = req.year.unwrap_or_else(|| i64::from(now.year()));
    let status = req
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("active");
    let now = now.to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO students (id, name, status, year, passed, theory_test_passed,
                              practical_test_passed, lessons_completed, phone, email,
                              notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, 0, 0, 0, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(status)
    .bind(year)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.notes)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::STUDENT_CREATE,
        resource_types::STUDENT,
        Some(&student.id),
        Some(&student.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::StudentChanged { id: student.id.clone() });

    tracing::info!(student = %student.name, year = student.year, "Student added");

    Ok((StatusCode::CREATED, Json(student)))
}

/// Update a student; absent fields keep their current value
pub async fn update_student(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "student_id") {
        return Err(ApiError::validation_field("student_id", e));
    }

    // Validate request
    validate_update_request(&req)?;

    // Check if student exists
    let _existing = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE students SET
            name = COALESCE(?, name),
            status = COALESCE(?, status),
            year = COALESCE(?, year),
            passed = COALESCE(?, passed),
            theory_test_passed = COALESCE(?, theory_test_passed),
            practical_test_passed = COALESCE(?, practical_test_passed),
            lessons_completed = COALESCE(?, lessons_completed),
            phone = COALESCE(?, phone),
            email = COALESCE(?, email),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.status)
    .bind(req.year)
    .bind(req.passed)
    .bind(req.theory_test_passed)
    .bind(req.practical_test_passed)
    .bind(req.lessons_completed)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.notes)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::STUDENT_UPDATE,
        resource_types::STUDENT,
        Some(&student.id),
        Some(&student.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::StudentChanged { id: student.id.clone() });

    Ok(Json(student))
}

/// Remove a student from the roster
pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "student_id") {
        return Err(ApiError::validation_field("student_id", e));
    }

    // Get student before deleting for audit log
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                ApiError::bad_request(
                    "Student has scheduled lessons; delete or reassign them first",
                )
            } else {
                ApiError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Student not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::STUDENT_DELETE,
        resource_types::STUDENT,
        Some(&student.id),
        Some(&student.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::StudentChanged { id: student.id });

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateStudentRequest {
        CreateStudentRequest {
            name: "Ana Ionescu".to_string(),
            status: Some("active".to_string()),
            year: Some(2025),
            phone: Some("+40 722 123 456".to_string()),
            email: Some("ana@example.com".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_create_validation_accepts_minimal() {
        let req = CreateStudentRequest {
            name: "Ana".to_string(),
            status: None,
            year: None,
            phone: None,
            email: None,
            notes: None,
        };
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_create_validation_rejects_bad_year() {
        let req = CreateStudentRequest { year: Some(1800), ..valid_request() };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_bad_email() {
        let req = CreateStudentRequest {
            email: Some("not-an-email".to_string()),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_update_validation_rejects_negative_lessons() {
        let req = UpdateStudentRequest {
            name: None,
            status: None,
            year: None,
            passed: None,
            theory_test_passed: None,
            practical_test_passed: None,
            lessons_completed: Some(-1),
            phone: None,
            email: None,
            notes: None,
        };
        assert!(validate_update_request(&req).is_err());
    }
}
