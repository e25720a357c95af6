//! User, role and session models.

use super::common::Role;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Dashboard account. Roles live in `user_roles`; a user's effective role
/// is the highest-ranked row there.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One granted role row. A user may hold several.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

/// User as returned by the API, with the resolved effective role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub roles: Vec<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User, roles: Vec<String>) -> Self {
        let role = Role::effective(roles.iter().map(|r| r.as_str()));
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role,
            roles,
            created_at: user.created_at.clone(),
        }
    }
}

/// Login session. `role` is the effective role resolved when the session
/// was created, so request handling never re-derives it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub role: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Roles granted at creation, e.g. `["admin"]`. Empty means a plain account.
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub role: String,
}
