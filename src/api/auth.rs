use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::audit::{audit_log, extract_client_ip};
use super::error::ApiError;
use super::metrics;
use crate::db::models::{
    actions, resource_types, LoginRequest, LoginResponse, Role, Session, User, UserResponse,
};
use crate::AppState;
use serde::{Deserialize, Serialize};

/// Name of the session cookie set on login
pub const SESSION_COOKIE: &str = "dd_session";

/// Response for setup status check
#[derive(Serialize)]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
}

/// Request for initial setup
#[derive(Deserialize)]
pub struct SetupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// The authenticated caller, resolved once per request.
///
/// `role` comes from the session row where it was cached at login, so
/// permission checks never re-scan `user_roles`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate password strength: at least 12 characters and at least three
/// of the four character classes (upper, lower, digit, symbol).
/// Returns None if valid, or Some(error_message) if invalid
pub fn validate_password_strength(password: &str) -> Option<String> {
    if password.len() < 12 {
        return Some("Password must be at least 12 characters".to_string());
    }

    let classes = [
        password.chars().any(|c| c.is_uppercase()),
        password.chars().any(|c| c.is_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_alphanumeric()),
    ];
    let satisfied = classes.iter().filter(|present| **present).count();

    if satisfied < 3 {
        return Some(
            "Password must mix at least three of: uppercase, lowercase, digits, symbols"
                .to_string(),
        );
    }

    // Check for common weak passwords
    let common_passwords = [
        "password123!", "Password123!", "Admin123!@#", "Welcome123!",
        "Qwerty123!@#", "Changeme123!", "Letmein123!@", "123456789Ab!",
    ];
    let lower = password.to_lowercase();
    for common in common_passwords {
        if lower.contains(&common.to_lowercase()) {
            return Some("Password is too common. Please choose a stronger password.".to_string());
        }
    }

    None
}

/// Does the provided token match the configured admin token?
/// Uses constant-time comparison to prevent timing attacks.
fn is_admin_token(config: &crate::config::Config, token: &str) -> bool {
    let admin_token = config.auth.admin_token.as_bytes();
    let provided = token.as_bytes();

    // Only compare if lengths match (constant-time check)
    admin_token.len() == provided.len() && admin_token.ct_eq(provided).into()
}

/// Fetch the role rows granted to a user
pub(crate) async fn fetch_roles(
    pool: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(role,)| role).collect())
}

/// Create a session row with the effective role cached on it.
/// Returns the bearer token to hand to the client.
async fn create_session(
    pool: &sqlx::SqlitePool,
    user_id: &str,
    role: Role,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(ttl_days)).to_rfc3339();

    // Opportunistic purge so dead sessions never pile up
    sqlx::query("DELETE FROM sessions WHERE datetime(expires_at) <= datetime('now')")
        .execute(pool)
        .await?;

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, role, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(token_hash)
    .bind(role.to_string())
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Build the session cookie attached to login responses
fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    // Find user by email
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = match user {
        Some(u) if verify_password(&request.password, &u.password_hash) => u,
        _ => {
            metrics::record_auth_failure();
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    // Resolve the effective role once and cache it on the session
    let roles = fetch_roles(&state.db, &user.id).await?;
    let role = Role::effective(roles.iter().map(|r| r.as_str()));

    let token = create_session(
        &state.db,
        &user.id,
        role,
        state.config.auth.session_ttl_days,
    )
    .await?;

    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::AUTH_LOGIN,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    tracing::info!(user = %user.email, role = %role, "User logged in");

    let jar = jar.add(session_cookie(&token));
    Ok((
        jar,
        Json(LoginResponse {
            token,
            user: UserResponse::from_user(&user, roles),
        }),
    ))
}

/// Logout endpoint. Deletes the session and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));

    let token = match extract_token(&headers, jar_token(&headers)) {
        Some(t) => t,
        None => return Ok((jar, StatusCode::NO_CONTENT)),
    };

    // The config admin token has no session row to delete
    if is_admin_token(&state.config, &token) {
        return Ok((jar, StatusCode::NO_CONTENT));
    }

    let token_hash = hash_token(&token);
    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .fetch_optional(&state.db)
            .await?;

    if let Some(session) = session {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&session.id)
            .execute(&state.db)
            .await?;

        let ip = extract_client_ip(&headers, None);
        audit_log(
            &state,
            actions::AUTH_LOGOUT,
            resource_types::USER,
            Some(&session.user_id),
            None,
            Some(&session.user_id),
            ip.as_deref(),
            None,
        )
        .await;
    }

    Ok((jar, StatusCode::NO_CONTENT))
}

/// Current user endpoint
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    // The synthetic admin-token identity has no user row
    if user.id == "system" {
        return Ok(Json(UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            role: Role::Admin,
            roles: vec!["admin".to_string()],
            created_at: chrono::Utc::now().to_rfc3339(),
        }));
    }

    let row: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

    let roles = fetch_roles(&state.db, &row.id).await?;
    Ok(Json(UserResponse::from_user(&row, roles)))
}

/// Check if initial setup is needed (no users exist)
pub async fn setup_status(State(state): State<Arc<AppState>>) -> Json<SetupStatusResponse> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await
        .unwrap_or((0,));

    Json(SetupStatusResponse {
        needs_setup: count.0 == 0,
    })
}

/// Initial setup endpoint - creates the first admin user.
/// Refused once any user exists; later accounts go through user management.
pub async fn setup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(request): Json<SetupRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    // Check if any user already exists
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    if count.0 > 0 {
        return Err(ApiError::forbidden("Setup has already been completed"));
    }

    // Validate input
    if let Err(e) = super::validation::validate_email(&request.email) {
        return Err(ApiError::validation_field("email", e));
    }
    if let Some(error) = validate_password_strength(&request.password) {
        return Err(ApiError::validation_field("password", error));
    }
    if let Err(e) = super::validation::validate_name(&request.name) {
        return Err(ApiError::validation_field("name", e));
    }

    // Create the admin user with an admin role row
    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.name)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    sqlx::query("INSERT INTO user_roles (id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&id)
        .bind("admin")
        .bind(&now)
        .execute(&state.db)
        .await?;

    tracing::info!("Created admin user during setup: {}", request.email);

    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::AUTH_SETUP,
        resource_types::USER,
        Some(&id),
        Some(&request.email),
        Some(&id),
        ip.as_deref(),
        None,
    )
    .await;

    // Auto-login the new user
    let token = create_session(
        &state.db,
        &id,
        Role::Admin,
        state.config.auth.session_ttl_days,
    )
    .await?;

    let user = User {
        id,
        email: request.email,
        password_hash,
        name: request.name,
        created_at: now.clone(),
        updated_at: now,
    };

    let jar = jar.add(session_cookie(&token));
    Ok((
        jar,
        Json(LoginResponse {
            token,
            user: UserResponse::from_user(&user, vec!["admin".to_string()]),
        }),
    ))
}

/// Create the configured admin account at startup when it is missing.
/// Does nothing unless `auth.bootstrap_admin` is explicitly enabled.
pub async fn ensure_admin_user(
    pool: &sqlx::SqlitePool,
    config: &crate::config::Config,
) -> anyhow::Result<()> {
    if !config.auth.bootstrap_admin {
        tracing::debug!("Admin bootstrap disabled, first account comes from the setup flow");
        return Ok(());
    }

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        tracing::debug!("Admin bootstrap skipped, accounts already exist");
        return Ok(());
    }

    let (email, password) = match (&config.auth.admin_email, &config.auth.admin_password) {
        (Some(e), Some(p)) => (e.clone(), p.clone()),
        _ => {
            tracing::warn!(
                "auth.bootstrap_admin is enabled but admin_email or admin_password is missing"
            );
            return Ok(());
        }
    };

    if let Some(error) = validate_password_strength(&password) {
        anyhow::bail!("Bootstrap admin password rejected: {}", error);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash bootstrap password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&config.auth.admin_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO user_roles (id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&id)
        .bind("admin")
        .bind(&now)
        .execute(pool)
        .await?;

    tracing::info!("Bootstrapped admin account {}", email);
    Ok(())
}

/// Extract the bearer token from request headers and cookies
fn extract_token(headers: &HeaderMap, cookie_token: Option<String>) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    // Then the X-API-Key header
    if let Some(api_key) = headers.get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Some(api_key.to_string());
    }

    // Finally the session cookie
    cookie_token
}

/// Read the session cookie out of the Cookie header
fn jar_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("Cookie").and_then(|h| h.to_str().ok())?;
    raw.split(';').find_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?;
        let value = parts.next()?;
        if key == SESSION_COOKIE {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Extract a token from a full request, including the query string
/// fallback used by WebSocket clients that cannot set headers.
fn extract_request_token(request: &Request<Body>) -> Option<String> {
    if let Some(token) = extract_token(request.headers(), jar_token(request.headers())) {
        return Some(token);
    }

    request.uri().query().and_then(|q| {
        q.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == "token" {
                Some(value.to_string())
            } else {
                None
            }
        })
    })
}

/// Resolve the caller behind a token
pub async fn get_current_user(
    pool: &sqlx::SqlitePool,
    config: &crate::config::Config,
    token: &str,
) -> Result<AuthUser, ApiError> {
    // For the admin token, return a synthetic system identity
    if is_admin_token(config, token) {
        return Ok(AuthUser {
            id: "system".to_string(),
            email: "system@drivedesk.local".to_string(),
            name: "System Admin".to_string(),
            role: Role::Admin,
        });
    }

    // Look up session and user
    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND datetime(expires_at) > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: Role::from(session.role),
    })
}

/// Auth middleware that validates tokens for dashboard routes
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_request_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    get_current_user(&state.db, &state.config, &token).await?;
    Ok(next.run(request).await)
}

/// Middleware for admin-only routes. Rejects authenticated callers whose
/// cached session role ranks below admin.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_request_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = get_current_user(&state.db, &state.config, &token).await?;
    if !user.role.has_at_least(Role::Admin) {
        return Err(ApiError::forbidden("Admin role required"));
    }

    Ok(next.run(request).await)
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, jar_token(&parts.headers))
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(&state.db, &state.config, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("Sup3r-Secret-Pass!").unwrap();
        assert!(verify_password("Sup3r-Secret-Pass!", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_password_bad_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_hash_is_deterministic() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_password_strength_rules() {
        assert!(validate_password_strength("short1!A").is_some());
        assert!(validate_password_strength("alllowercaseonly").is_some());
        assert!(validate_password_strength("lowercase1234567").is_some());
        assert!(validate_password_strength("UPPER-AND-SYMBOLS").is_some());
        assert!(validate_password_strength("Password123!extra").is_some());

        assert!(validate_password_strength("Curbside-Pickup-77!").is_none());
    }

    #[test]
    fn test_password_three_classes_suffice() {
        // upper + lower + digit, no symbol
        assert!(validate_password_strength("correcthorse99X").is_none());
        // lower + digit + symbol, no upper
        assert!(validate_password_strength("staple-battery-42").is_none());
        // upper + lower + symbol, no digit
        assert!(validate_password_strength("Staple-Battery-Horse").is_none());
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        headers.insert("X-API-Key", "fallback".parse().unwrap());

        assert_eq!(extract_token(&headers, None), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_token_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            format!("other=1; {}=cookie-token", SESSION_COOKIE)
                .parse()
                .unwrap(),
        );

        let cookie = jar_token(&headers);
        assert_eq!(cookie.as_deref(), Some("cookie-token"));
        assert_eq!(extract_token(&headers, cookie), Some("cookie-token".to_string()));
    }
}
