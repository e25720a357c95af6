//! Review models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: String,
    pub name: String,
    pub rating: i64,
    pub comment: String,
    pub approved: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub name: String,
    pub rating: i64,
    pub comment: String,
}

/// Aggregate over approved reviews for the public landing page.
/// `average_rating` is rendered with one decimal, `None` when there
/// are no approved reviews yet.
#[derive(Debug, Serialize)]
pub struct ReviewSummary {
    pub average_rating: Option<String>,
    pub count: i64,
}
