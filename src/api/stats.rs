//! Dashboard statistics endpoint.
//!
//! One aggregate payload so the admin dashboard renders from a single
//! request instead of hitting every listing endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

use super::error::ApiError;

/// Aggregate counters for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Total contact form leads
    pub leads_total: i64,
    /// Leads nobody has opened yet
    pub leads_unread: i64,
    /// Reviews waiting for approval
    pub reviews_pending: i64,
    /// Approved, publicly visible reviews
    pub reviews_approved: i64,
    /// Mean approved rating formatted to one decimal, null with no approved reviews
    pub average_rating: Option<String>,
    /// Students on the roster
    pub students_total: i64,
    /// Accounts that can log in
    pub users_total: i64,
    /// Accounts holding the admin role
    pub admins_total: i64,
    /// Instructors currently teaching
    pub instructors_active: i64,
    /// Vehicles in service
    pub vehicles_active: i64,
    /// Scheduled lessons that have not happened yet
    pub lessons_upcoming: i64,
}

async fn count(pool: &sqlx::SqlitePool, sql: &str) -> Result<i64, sqlx::Error> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(n)
}

/// Get dashboard statistics
/// GET /api/stats
pub async fn get_dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, ApiError> {
    let leads_total = count(&state.db, "SELECT COUNT(*) FROM leads").await?;
    let leads_unread = count(&state.db, "SELECT COUNT(*) FROM leads WHERE is_read = 0").await?;

    let reviews_pending =
        count(&state.db, "SELECT COUNT(*) FROM reviews WHERE approved = 0").await?;
    let reviews_approved =
        count(&state.db, "SELECT COUNT(*) FROM reviews WHERE approved = 1").await?;

    let (average,): (Option<f64>,) =
        sqlx::query_as("SELECT AVG(rating) FROM reviews WHERE approved = 1")
            .fetch_one(&state.db)
            .await?;

    let students_total = count(&state.db, "SELECT COUNT(*) FROM students").await?;
    let users_total = count(&state.db, "SELECT COUNT(*) FROM users").await?;
    let admins_total = count(
        &state.db,
        "SELECT COUNT(DISTINCT user_id) FROM user_roles WHERE role = 'admin'",
    )
    .await?;

    let instructors_active =
        count(&state.db, "SELECT COUNT(*) FROM instructors WHERE is_active = 1").await?;
    let vehicles_active =
        count(&state.db, "SELECT COUNT(*) FROM vehicles WHERE is_active = 1").await?;
    let lessons_upcoming = count(
        &state.db,
        "SELECT COUNT(*) FROM lessons WHERE status = 'scheduled' AND datetime(scheduled_date) >= datetime('now')",
    )
    .await?;

    Ok(Json(DashboardStats {
        leads_total,
        leads_unread,
        reviews_pending,
        reviews_approved,
        average_rating: average.map(|a| format!("{:.1}", a)),
        students_total,
        users_total,
        admins_total,
        instructors_active,
        vehicles_active,
        lessons_upcoming,
    }))
}
