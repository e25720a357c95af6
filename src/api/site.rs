//! Site profile endpoints.
//!
//! The profile is a single row seeded at startup. The public landing page
//! reads it; an admin overwrites it wholesale, so leaving a field out of
//! the PUT clears it.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::db::models::{actions, resource_types, SiteProfile, UpdateSiteProfileRequest};
use crate::db::SITE_PROFILE_ID;
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::events::{publish, ChangeEvent};
use super::validation::{validate_text, validate_url};

/// Validate an UpdateSiteProfileRequest
fn validate_update_request(req: &UpdateSiteProfileRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(description) = &req.description {
        if let Err(e) = validate_text(description, "description", 2000) {
            errors.add("description", &e);
        }
    }

    if let Err(e) = validate_url(&req.image_url, "image_url") {
        errors.add("image_url", &e);
    }

    if let Err(e) = validate_url(&req.facebook, "facebook") {
        errors.add("facebook", &e);
    }

    if let Err(e) = validate_url(&req.instagram, "instagram") {
        errors.add("instagram", &e);
    }

    if let Err(e) = validate_url(&req.tiktok, "tiktok") {
        errors.add("tiktok", &e);
    }

    if let Err(e) = validate_url(&req.whatsapp, "whatsapp") {
        errors.add("whatsapp", &e);
    }

    errors.finish()
}

/// The public profile and social links for the landing page
pub async fn get_site_profile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SiteProfile>, ApiError> {
    let profile = sqlx::query_as::<_, SiteProfile>("SELECT * FROM site_profile WHERE id = ?")
        .bind(SITE_PROFILE_ID)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Site profile not found"))?;

    Ok(Json(profile))
}

/// Overwrite the profile. Fields left out of the request are cleared.
pub async fn update_site_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<UpdateSiteProfileRequest>,
) -> Result<Json<SiteProfile>, ApiError> {
    // Validate request
    validate_update_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE site_profile SET
            description = ?,
            image_url = ?,
            facebook = ?,
            instagram = ?,
            tiktok = ?,
            whatsapp = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.description)
    .bind(&req.image_url)
    .bind(&req.facebook)
    .bind(&req.instagram)
    .bind(&req.tiktok)
    .bind(&req.whatsapp)
    .bind(&now)
    .bind(SITE_PROFILE_ID)
    .execute(&state.db)
    .await?;

    let profile = sqlx::query_as::<_, SiteProfile>("SELECT * FROM site_profile WHERE id = ?")
        .bind(SITE_PROFILE_ID)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::SITE_PROFILE_UPDATE,
        resource_types::SITE_PROFILE,
        Some(SITE_PROFILE_ID),
        None,
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::ProfileUpdated);

    tracing::info!("Site profile updated");

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_request() -> UpdateSiteProfileRequest {
        UpdateSiteProfileRequest {
            description: None,
            image_url: None,
            facebook: None,
            instagram: None,
            tiktok: None,
            whatsapp: None,
        }
    }

    #[test]
    fn test_update_validation_accepts_empty() {
        // clearing everything is a valid wholesale write
        assert!(validate_update_request(&empty_request()).is_ok());
    }

    #[test]
    fn test_update_validation_accepts_links() {
        let req = UpdateSiteProfileRequest {
            description: Some("Instructor auto cu 15 ani de experienta.".to_string()),
            facebook: Some("https://facebook.com/scoala.auto".to_string()),
            whatsapp: Some("https://wa.me/40722123456".to_string()),
            ..empty_request()
        };
        assert!(validate_update_request(&req).is_ok());
    }

    #[test]
    fn test_update_validation_rejects_bad_url() {
        let req = UpdateSiteProfileRequest {
            instagram: Some("not a link".to_string()),
            ..empty_request()
        };
        assert!(validate_update_request(&req).is_err());
    }
}
