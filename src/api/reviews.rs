//! Review endpoints.
//!
//! Anyone can submit a review from the landing page, but it stays hidden
//! until an admin approves it. The public listing and summary only ever
//! see approved rows.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{actions, resource_types, CreateReviewRequest, Review, ReviewSummary};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::events::{publish, ChangeEvent};
use super::metrics;
use super::validation::{validate_name, validate_rating, validate_text, validate_uuid};

/// Validate a CreateReviewRequest
fn validate_create_request(req: &CreateReviewRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", &e);
    }

    if let Err(e) = validate_rating(req.rating) {
        errors.add("rating", &e);
    }

    if req.comment.trim().is_empty() {
        errors.add("comment", "Comment is required");
    } else if let Err(e) = validate_text(&req.comment, "comment", 2000) {
        errors.add("comment", &e);
    }

    errors.finish()
}

/// Shape the public summary from the aggregate query
fn format_summary(average: Option<f64>, count: i64) -> ReviewSummary {
    ReviewSummary {
        average_rating: average.map(|a| format!("{:.1}", a)),
        count,
    }
}

/// Submit a review from the landing page. Starts unapproved.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO reviews (id, name, rating, comment, approved, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.rating)
    .bind(req.comment.trim())
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store review: {}", e);
        ApiError::database("Failed to store review")
    })?;

    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    metrics::record_review_submitted();
    publish(&state, ChangeEvent::ReviewSubmitted { id: review.id.clone() });

    tracing::info!(review = %review.id, rating = review.rating, "New review submitted");

    Ok((StatusCode::CREATED, Json(review)))
}

/// List approved reviews for the landing page, newest first
pub async fn list_public_reviews(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE approved = 1 ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reviews))
}

/// Aggregate rating over approved reviews
pub async fn review_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReviewSummary>, ApiError> {
    let (average, count): (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(rating), COUNT(*) FROM reviews WHERE approved = 1",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(format_summary(average, count)))
}

/// List reviews awaiting approval, oldest first so the queue drains in order
pub async fn list_pending_reviews(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE approved = 0 ORDER BY created_at ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reviews))
}

/// List every review, newest first
pub async fn list_all_reviews(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews =
        sqlx::query_as::<_, Review>("SELECT * FROM reviews ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(reviews))
}

/// Approve a review so it shows on the landing page
pub async fn approve_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Review>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "review_id") {
        return Err(ApiError::validation_field("review_id", e));
    }

    // Check if review exists
    let _existing = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    sqlx::query("UPDATE reviews SET approved = 1 WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::REVIEW_APPROVE,
        resource_types::REVIEW,
        Some(&review.id),
        Some(&review.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    metrics::record_review_approved();
    publish(&state, ChangeEvent::ReviewApproved { id: review.id.clone() });

    Ok(Json(review))
}

/// Delete a review
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "review_id") {
        return Err(ApiError::validation_field("review_id", e));
    }

    // Get review before deleting for audit log
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Review not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::REVIEW_DELETE,
        resource_types::REVIEW,
        Some(&review.id),
        Some(&review.name),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    publish(&state, ChangeEvent::ReviewDeleted { id: review.id });

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_reviews() {
        let summary = format_summary(Some(4.666666), 3);
        assert_eq!(summary.average_rating.as_deref(), Some("4.7"));
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn test_summary_single_rating_keeps_decimal() {
        let summary = format_summary(Some(5.0), 1);
        assert_eq!(summary.average_rating.as_deref(), Some("5.0"));
    }

    #[test]
    fn test_summary_empty() {
        let summary = format_summary(None, 0);
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn test_review_validation() {
        let ok = CreateReviewRequest {
            name: "Radu".to_string(),
            rating: 5,
            comment: "Passed first try.".to_string(),
        };
        assert!(validate_create_request(&ok).is_ok());

        let bad_rating = CreateReviewRequest { rating: 9, ..clone_req(&ok) };
        assert!(validate_create_request(&bad_rating).is_err());

        let empty_comment = CreateReviewRequest {
            comment: "   ".to_string(),
            ..clone_req(&ok)
        };
        assert!(validate_create_request(&empty_comment).is_err());

        let long_comment = CreateReviewRequest {
            comment: "x".repeat(1999),
            ..clone_req(&ok)
        };
        assert!(validate_create_request(&long_comment).is_ok());

        let oversized_comment = CreateReviewRequest {
            comment: "x".repeat(2001),
            ..clone_req(&ok)
        };
        assert!(validate_create_request(&oversized_comment).is_err());
    }

    fn clone_req(req: &CreateReviewRequest) -> CreateReviewRequest {
        CreateReviewRequest {
            name: req.name.clone(),
            rating: req.rating,
            comment: req.comment.clone(),
        }
    }
}
