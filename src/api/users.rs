//! Account and role management endpoints (admin only).
//!
//! Roles live in `user_roles`; a user's effective role is the highest-ranked
//! row. Sessions cache the effective role, so every grant or revoke here
//! recomputes it and rewrites the cached copy on the user's live sessions.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    actions, resource_types, CreateUserRequest, GrantRoleRequest, Role, User, UserResponse,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::{self, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::events::{publish, ChangeEvent};
use super::validation::{validate_email, validate_name, validate_uuid};

/// Validate a CreateUserRequest
fn validate_create_request(req: &CreateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", &e);
    }

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", &e);
    }

    if let Some(e) = auth::validate_password_strength(&req.password) {
        errors.add("password", &e);
    }

    for role in &req.roles {
        if role.parse::<Role>().is_err() {
            errors.add("roles", &format!("Unknown role: {}", role));
        }
    }

    errors.finish()
}

/// Normalized role names with duplicates removed, rank order preserved
fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut parsed: Vec<Role> = roles
        .iter()
        .filter_map(|r| r.parse::<Role>().ok())
        .collect();
    parsed.sort_by_key(|r| std::cmp::Reverse(r.level()));
    parsed.dedup();
    parsed.iter().map(Role::to_string).collect()
}

/// Count users holding the admin role
async fn count_admins(pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT user_id) FROM user_roles WHERE role = 'admin'",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Recompute the effective role and rewrite it on the user's live sessions
async fn refresh_session_role(pool: &sqlx::SqlitePool, user_id: &str) -> Result<(), sqlx::Error> {
    let roles = auth::fetch_roles(pool, user_id).await?;
    let effective = Role::effective(roles.iter().map(String::as_str));

    sqlx::query("UPDATE sessions SET role = ? WHERE user_id = ?")
        .bind(effective.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// List all accounts with their granted roles
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at ASC")
        .fetch_all(&state.db)
        .await?;

    let role_rows: Vec<(String, String)> =
        sqlx::query_as("SELECT user_id, role FROM user_roles ORDER BY role")
            .fetch_all(&state.db)
            .await?;

    let mut roles_by_user: HashMap<String, Vec<String>> = HashMap::new();
    for (user_id, role) in role_rows {
        roles_by_user.entry(user_id).or_default().push(role);
    }

    let responses = users
        .iter()
        .map(|u| {
            let roles = roles_by_user.remove(&u.id).unwrap_or_default();
            UserResponse::from_user(u, roles)
        })
        .collect();

    Ok(Json(responses))
}

/// Create an account, optionally with initial roles
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.name.trim())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create user: {}", e);
        // Check for unique constraint violation
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("A user with this email already exists")
        } else {
            ApiError::database("Failed to create user")
        }
    })?;

    let roles = normalize_roles(&req.roles);
    for role in &roles {
        sqlx::query(
            "INSERT INTO user_roles (id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(role)
        .bind(&now)
        .execute(&state.db)
        .await?;
    }

    let created = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::USER_CREATE,
        resource_types::USER,
        Some(&created.id),
        Some(&created.email),
        Some(&user.id),
        ip.as_deref(),
        Some(serde_json::json!({ "roles": roles })),
    )
    .await;

    publish(&state, ChangeEvent::RolesChanged { user_id: created.id.clone() });

    tracing::info!(user = %created.email, ?roles, "User account created");

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&created, roles))))
}

/// Delete an account. Refuses to delete yourself or the last admin.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if id == user.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    // Get user before deleting for audit log
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let target_roles = auth::fetch_roles(&state.db, &id).await?;
    if target_roles.iter().any(|r| r == "admin") && count_admins(&state.db).await? <= 1 {
        return Err(ApiError::bad_request("Cannot delete the last admin account"));
    }

    // Role rows and sessions go with the user (FK cascade)
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::USER_DELETE,
        resource_types::USER,
        Some(&target.id),
        Some(&target.email),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    tracing::info!(user = %target.email, "User account deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Grant a role to a user
pub async fn grant_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<GrantRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    let role: Role = req
        .role
        .parse()
        .map_err(|e: String| ApiError::validation_field("role", e))?;

    // Check if user exists
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO user_roles (id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(role.to_string())
        .bind(&now)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                ApiError::conflict("User already has this role")
            } else {
                ApiError::from(e)
            }
        })?;

    refresh_session_role(&state.db, &id).await?;

    let roles = auth::fetch_roles(&state.db, &id).await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::ROLE_GRANT,
        resource_types::ROLE,
        Some(&target.id),
        Some(&target.email),
        Some(&user.id),
        ip.as_deref(),
        Some(serde_json::json!({ "role": role.to_string() })),
    )
    .await;

    publish(&state, ChangeEvent::RolesChanged { user_id: target.id.clone() });

    tracing::info!(user = %target.email, role = %role, "Role granted");

    Ok(Json(UserResponse::from_user(&target, roles)))
}

/// Revoke a role from a user. Refuses to strip the last admin.
pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path((id, role_name)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    let role: Role = role_name
        .parse()
        .map_err(|e: String| ApiError::validation_field("role", e))?;

    // Check if user exists
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if role.is_admin() && count_admins(&state.db).await? <= 1 {
        return Err(ApiError::bad_request("Cannot revoke the last admin role"));
    }

    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
        .bind(&id)
        .bind(role.to_string())
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User does not have this role"));
    }

    refresh_session_role(&state.db, &id).await?;

    let roles = auth::fetch_roles(&state.db, &id).await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::ROLE_REVOKE,
        resource_types::ROLE,
        Some(&target.id),
        Some(&target.email),
        Some(&user.id),
        ip.as_deref(),
        Some(serde_json::json!({ "role": role.to_string() })),
    )
    .await;

    publish(&state, ChangeEvent::RolesChanged { user_id: target.id.clone() });

    tracing::info!(user = %target.email, role = %role, "Role revoked");

    Ok(Json(UserResponse::from_user(&target, roles)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validation_rejects_weak_password() {
        let req = CreateUserRequest {
            email: "new@example.com".to_string(),
            password: "short".to_string(),
            name: "New User".to_string(),
            roles: vec![],
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_unknown_role() {
        let req = CreateUserRequest {
            email: "new@example.com".to_string(),
            password: "Curbside-Pickup-77!".to_string(),
            name: "New User".to_string(),
            roles: vec!["superuser".to_string()],
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_accepts_valid() {
        let req = CreateUserRequest {
            email: "new@example.com".to_string(),
            password: "Curbside-Pickup-77!".to_string(),
            name: "New User".to_string(),
            roles: vec!["instructor".to_string()],
        };
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_normalize_roles_dedupes_and_ranks() {
        let roles = vec![
            "user".to_string(),
            "admin".to_string(),
            "ADMIN".to_string(),
            "instructor".to_string(),
        ];
        assert_eq!(normalize_roles(&roles), vec!["admin", "instructor", "user"]);
    }

    #[test]
    fn test_normalize_roles_drops_unknown() {
        let roles = vec!["wizard".to_string(), "student".to_string()];
        assert_eq!(normalize_roles(&roles), vec!["student"]);
    }
}
