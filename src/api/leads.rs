//! Contact form lead endpoints.
//!
//! Lead submission is public (the landing page contact form posts here);
//! everything else lives behind the admin dashboard.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{actions, resource_types, CreateLeadRequest, Lead, LeadQuery};
use crate::notifications::email::EmailService;
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::events::{publish, ChangeEvent};
use super::metrics;
use super::validation::{
    validate_email, validate_license_category, validate_name, validate_phone, validate_service,
    validate_text, validate_uuid,
};

/// Validate a CreateLeadRequest
fn validate_create_request(req: &CreateLeadRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", &e);
    }

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", &e);
    }

    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", &e);
    }

    if let Err(e) = validate_service(&req.service) {
        errors.add("service", &e);
    }

    if let Err(e) = validate_license_category(&req.license_category) {
        errors.add("license_category", &e);
    }

    if let Some(ref message) = req.message {
        if let Err(e) = validate_text(message, "message", 2000) {
            errors.add("message", &e);
        }
    }

    errors.finish()
}

/// Submit a lead from the public contact form
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let license_category = req.license_category.to_uppercase();

    sqlx::query(
        r#"
        INSERT INTO leads (id, name, email, phone, service, license_category, message, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.service)
    .bind(&license_category)
    .bind(&req.message)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store lead: {}", e);
        ApiError::database("Failed to store lead")
    })?;

    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    metrics::record_lead_received(&lead.service);
    publish(&state, ChangeEvent::LeadCreated { id: lead.id.clone() });

    // Notify the instructor in the background; the submitter never waits
    // on SMTP and never sees delivery problems.
    let mailer = EmailService::new(state.config.email.clone());
    if mailer.is_enabled() {
        let notification = lead.clone();
        tokio::spawn(async move {
            match mailer.send_lead_notification(&notification).await {
                Ok(()) => metrics::record_email_sent(),
                Err(e) => tracing::warn!("Failed to send lead notification: {}", e),
            }
        });
    }

    tracing::info!(lead = %lead.id, service = %lead.service, "New lead received");

    Ok((StatusCode::CREATED, Json(lead)))
}

/// List leads, newest first
///
/// Query parameters:
/// - unread: true to show only unread leads
/// - service: filter by requested service
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeadQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if query.unread == Some(true) {
        conditions.push("is_read = 0".to_string());
    }

    if let Some(service) = &query.service {
        if let Err(e) = validate_service(service) {
            return Err(ApiError::validation_field("service", e));
        }
        conditions.push("service = ?".to_string());
        bindings.push(service.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT * FROM leads {} ORDER BY created_at DESC",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, Lead>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }

    let leads = query_builder.fetch_all(&state.db).await?;
    Ok(Json(leads))
}

/// Get a single lead
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lead_id") {
        return Err(ApiError::validation_field("lead_id", e));
    }

    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found"))?;

    Ok(Json(lead))
}

/// Mark a lead as read
pub async fn mark_lead_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lead_id") {
        return Err(ApiError::validation_field("lead_id", e));
    }

    // Check if lead exists
    let _existing = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found"))?;

    sqlx::query("UPDATE leads SET is_read = 1 WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::LEAD_READ,
        resource_types::LEAD,
        Some(&lead.id),
        Some(&lead.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(lead))
}

/// Delete a lead
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "lead_id") {
        return Err(ApiError::validation_field("lead_id", e));
    }

    // Get lead before deleting for audit log
    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found"))?;

    let result = sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Lead not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::LEAD_DELETE,
        resource_types::LEAD,
        Some(&lead.id),
        Some(&lead.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::LeadDeleted { id: lead.id });

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateLeadRequest {
        CreateLeadRequest {
            name: "Ana Ionescu".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+40 721 111 222".to_string(),
            service: "driving-lessons".to_string(),
            license_category: "B".to_string(),
            message: Some("When can I start?".to_string()),
        }
    }

    #[test]
    fn test_valid_lead_passes() {
        assert!(validate_create_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_bad_service_rejected() {
        let mut req = valid_request();
        req.service = "helicopter-lessons".to_string();
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_bad_email_and_phone_rejected() {
        let mut req = valid_request();
        req.email = "nope".to_string();
        req.phone = "nope".to_string();
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_license_category_defaults_to_b() {
        let req: CreateLeadRequest = serde_json::from_str(
            r#"{"name":"Ana","email":"ana@example.com","phone":"0721234567","service":"driving-lessons"}"#,
        )
        .unwrap();
        assert_eq!(req.license_category, "B");
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_missing_message_is_fine() {
        let mut req = valid_request();
        req.message = None;
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut req = valid_request();
        req.message = Some("x".repeat(2001));
        assert!(validate_create_request(&req).is_err());
    }
}
