//! Audit trail rows and queries.
//!
//! Every mutating dashboard operation and every auth event leaves a row
//! here. Writes go through `api::audit::audit_log`, which swallows storage
//! errors so auditing can never fail a request.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Filters accepted by the audit listing endpoint. Dates are compared as
/// ISO 8601 strings, which sorts correctly for UTC timestamps.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// 1-indexed, defaults to 1
    pub page: Option<i64>,
    /// Defaults to 50, capped at 100
    pub per_page: Option<i64>,
}

/// Audit action names, `resource.verb` style.
pub mod actions {
    pub const LEAD_READ: &str = "lead.read";
    pub const LEAD_DELETE: &str = "lead.delete";

    pub const REVIEW_APPROVE: &str = "review.approve";
    pub const REVIEW_DELETE: &str = "review.delete";

    pub const STUDENT_CREATE: &str = "student.create";
    pub const STUDENT_UPDATE: &str = "student.update";
    pub const STUDENT_DELETE: &str = "student.delete";

    pub const INSTRUCTOR_CREATE: &str = "instructor.create";
    pub const INSTRUCTOR_UPDATE: &str = "instructor.update";
    pub const INSTRUCTOR_DELETE: &str = "instructor.delete";

    pub const VEHICLE_CREATE: &str = "vehicle.create";
    pub const VEHICLE_UPDATE: &str = "vehicle.update";
    pub const VEHICLE_DELETE: &str = "vehicle.delete";

    pub const LESSON_CREATE: &str = "lesson.create";
    pub const LESSON_UPDATE: &str = "lesson.update";
    pub const LESSON_DELETE: &str = "lesson.delete";

    pub const USER_CREATE: &str = "user.create";
    pub const USER_DELETE: &str = "user.delete";
    pub const ROLE_GRANT: &str = "role.grant";
    pub const ROLE_REVOKE: &str = "role.revoke";

    pub const SITE_PROFILE_UPDATE: &str = "site_profile.update";

    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGOUT: &str = "auth.logout";
    pub const AUTH_SETUP: &str = "auth.setup";
}

/// Resource type names used in audit rows.
pub mod resource_types {
    pub const LEAD: &str = "lead";
    pub const REVIEW: &str = "review";
    pub const STUDENT: &str = "student";
    pub const INSTRUCTOR: &str = "instructor";
    pub const VEHICLE: &str = "vehicle";
    pub const LESSON: &str = "lesson";
    pub const USER: &str = "user";
    pub const ROLE: &str = "role";
    pub const SITE_PROFILE: &str = "site_profile";
}

/// Insert one audit row.
pub async fn log_audit(
    db: &SqlitePool,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    resource_name: Option<&str>,
    user_id: Option<&str>,
    ip_address: Option<&str>,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource_type, resource_id, resource_name, details, ip_address, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(resource_name)
    .bind(details.map(|d| d.to_string()))
    .bind(ip_address)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(db)
    .await?;

    tracing::debug!(action, resource_type, resource_id, user_id, "Audit row written");
    Ok(())
}

/// Filtered, paginated audit listing, newest first.
pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.filter(|p| *p > 0).unwrap_or(1);
    let per_page = query.per_page.map_or(50, |n| n.clamp(1, 100));

    let mut filters: Vec<(&str, &str)> = Vec::new();
    if let Some(v) = query.action.as_deref() {
        filters.push(("action = ?", v));
    }
    if let Some(v) = query.resource_type.as_deref() {
        filters.push(("resource_type = ?", v));
    }
    if let Some(v) = query.resource_id.as_deref() {
        filters.push(("resource_id = ?", v));
    }
    if let Some(v) = query.user_id.as_deref() {
        filters.push(("user_id = ?", v));
    }
    if let Some(v) = query.start_date.as_deref() {
        filters.push(("created_at >= ?", v));
    }
    if let Some(v) = query.end_date.as_deref() {
        filters.push(("created_at <= ?", v));
    }

    let where_clause = if filters.is_empty() {
        String::new()
    } else {
        let clauses: Vec<&str> = filters.iter().map(|(clause, _)| *clause).collect();
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    for (_, value) in &filters {
        count = count.bind(*value);
    }
    let total = count.fetch_one(db).await?;

    let rows_sql = format!(
        "SELECT id, user_id, action, resource_type, resource_id, resource_name, details, \
         ip_address, created_at FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut rows = sqlx::query_as::<_, AuditLog>(&rows_sql);
    for (_, value) in &filters {
        rows = rows.bind(*value);
    }
    let items = rows
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(db)
        .await?;

    Ok(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages: (total + per_page - 1) / per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE audit_logs (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT,
                resource_name TEXT,
                user_id TEXT,
                ip_address TEXT,
                details TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_log_and_list_round_trip() {
        let pool = test_pool().await;

        log_audit(
            &pool,
            "lead.delete",
            "lead",
            Some("lead-1"),
            Some("Ana"),
            Some("admin-1"),
            Some("203.0.113.7"),
            None,
        )
        .await
        .unwrap();
        log_audit(&pool, "review.approve", "review", Some("rev-1"), None, None, None, None)
            .await
            .unwrap();

        let all = list_audit_logs(&pool, &AuditLogQuery::default()).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.page, 1);
    }

    #[tokio::test]
    async fn test_list_applies_filters() {
        let pool = test_pool().await;

        log_audit(&pool, "lead.delete", "lead", Some("lead-1"), None, Some("u1"), None, None)
            .await
            .unwrap();
        log_audit(&pool, "lead.read", "lead", Some("lead-2"), None, Some("u2"), None, None)
            .await
            .unwrap();

        let query = AuditLogQuery {
            action: Some("lead.delete".to_string()),
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        let filtered = list_audit_logs(&pool, &query).await.unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.items[0].resource_id.as_deref(), Some("lead-1"));
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let pool = test_pool().await;

        for i in 0..5 {
            log_audit(&pool, "lead.read", "lead", Some(&format!("lead-{}", i)), None, None, None, None)
                .await
                .unwrap();
        }

        let query = AuditLogQuery {
            page: Some(2),
            per_page: Some(2),
            ..Default::default()
        };
        let page = list_audit_logs(&pool, &query).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);
    }
}
