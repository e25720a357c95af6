//! Audit log endpoints and the helper handlers call after every mutation.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::db::{list_audit_logs, log_audit, AuditLogListResponse, AuditLogQuery};
use crate::AppState;

use super::error::ApiError;

fn forwarded_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let ip = value.split(',').next()?.trim();
    if ip.is_empty() {
        None
    } else {
        Some(ip.to_string())
    }
}

/// Best-effort client address for audit rows. Proxy headers win over the
/// socket address, which only names the proxy when one is in front.
pub fn extract_client_ip(headers: &HeaderMap, conn_info: Option<&SocketAddr>) -> Option<String> {
    forwarded_ip(headers, "x-forwarded-for")
        .or_else(|| forwarded_ip(headers, "x-real-ip"))
        .or_else(|| conn_info.map(|addr| addr.ip().to_string()))
}

/// Write an audit row, logging instead of propagating failures. Mutations
/// must not be rolled back or errored because the audit insert failed.
pub async fn audit_log(
    state: &AppState,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    resource_name: Option<&str>,
    user_id: Option<&str>,
    ip_address: Option<&str>,
    details: Option<serde_json::Value>,
) {
    let result = log_audit(
        &state.db,
        action,
        resource_type,
        resource_id,
        resource_name,
        user_id,
        ip_address,
        details,
    )
    .await;

    if let Err(e) = result {
        tracing::warn!(action, resource_type, error = %e, "Failed to write audit row");
    }
}

/// `GET /api/audit-logs`
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    Ok(Json(list_audit_logs(&state.db, &query).await?))
}

/// `GET /api/audit-logs/action-types`, feeds the dashboard filter dropdown.
pub async fn list_action_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let actions = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT action FROM audit_logs ORDER BY action",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(actions))
}

/// `GET /api/audit-logs/resource-types`
pub async fn list_resource_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let types = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT resource_type FROM audit_logs ORDER BY resource_type",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(types))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

        assert_eq!(
            extract_client_ip(&headers, None),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_real_ip_when_no_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());

        assert_eq!(
            extract_client_ip(&headers, None),
            Some("198.51.100.4".to_string())
        );
    }

    #[test]
    fn test_socket_addr_fallback() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.0.2.10:55000".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(&addr)),
            Some("192.0.2.10".to_string())
        );
        assert_eq!(extract_client_ip(&headers, None), None);
    }

    #[test]
    fn test_blank_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "  ".parse().unwrap());

        assert_eq!(extract_client_ip(&headers, None), None);
    }
}
