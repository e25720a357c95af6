//! Error envelope shared by every API handler.
//!
//! Handlers return `Result<_, ApiError>`; the `IntoResponse` impl turns the
//! error into `{"error": {"code", "message", "details?"}}` with the matching
//! HTTP status.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Per-field validation messages, keyed by field name.
/// BTreeMap keeps the serialized detail object in a stable order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Machine-readable error categories carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    InternalError,
    DatabaseError,
    ServiceUnavailable,
}

impl ErrorCode {
    fn meta(self) -> (StatusCode, &'static str) {
        match self {
            ErrorCode::BadRequest => (StatusCode::BAD_REQUEST, "bad_request"),
            ErrorCode::ValidationError => (StatusCode::BAD_REQUEST, "validation_error"),
            ErrorCode::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ErrorCode::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            ErrorCode::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorCode::Conflict => (StatusCode::CONFLICT, "conflict"),
            ErrorCode::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "too_many_requests"),
            ErrorCode::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ErrorCode::DatabaseError => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ErrorCode::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
        }
    }

    /// HTTP status this code maps to.
    pub fn status_code(self) -> StatusCode {
        self.meta().0
    }

    /// Wire name as it appears in the envelope.
    pub fn as_str(self) -> &'static str {
        self.meta().1
    }
}

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    fields: Option<FieldErrors>,
}

#[derive(Serialize)]
struct Envelope {
    error: Payload,
}

#[derive(Serialize)]
struct Payload {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// 400 carrying the full per-field error map. The top-level message is
    /// the lone field message when only one field failed, a count otherwise.
    pub fn validation(fields: FieldErrors) -> Self {
        let message = match fields.len() {
            1 => fields
                .values()
                .flatten()
                .next()
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string()),
            n => format!("Validation failed for {} fields", n),
        };

        Self {
            code: ErrorCode::ValidationError,
            message,
            fields: Some(fields),
        }
    }

    /// Shortcut for a validation failure on a single field.
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.into()]);
        Self::validation(fields)
    }

    #[cfg(test)]
    fn field_messages(&self, field: &str) -> Option<&[String]> {
        self.fields.as_ref()?.get(field).map(Vec::as_slice)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = Envelope {
            error: Payload {
                code: self.code.as_str(),
                message: self.message,
                details: self.fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

/// Raw database failures log the real error and surface a generic message.
/// Constraint violations get more useful mappings: a missing row is 404, a
/// UNIQUE hit is 409 and a foreign key hit is 400.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Database error");

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                ApiError::conflict("A resource with this identifier already exists")
            }
            sqlx::Error::Database(db) if db.message().contains("FOREIGN KEY constraint failed") => {
                ApiError::bad_request("Referenced resource does not exist")
            }
            _ => ApiError::database("A database error occurred"),
        }
    }
}

/// Collects field errors across a whole request body so the client sees
/// every problem in one response instead of one per round trip.
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    fields: FieldErrors,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.fields.entry(field.into()).or_default().push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The collected error, if any field failed.
    pub fn build(self) -> Option<ApiError> {
        if self.fields.is_empty() {
            None
        } else {
            Some(ApiError::validation(self.fields))
        }
    }

    /// Err when any field failed, Ok otherwise. Handlers call this once
    /// after running all field checks.
    pub fn finish(self) -> Result<(), ApiError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_wire_names_are_snake_case() {
        for code in [
            ErrorCode::BadRequest,
            ErrorCode::ValidationError,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::NotFound,
            ErrorCode::Conflict,
            ErrorCode::TooManyRequests,
            ErrorCode::InternalError,
            ErrorCode::DatabaseError,
            ErrorCode::ServiceUnavailable,
        ] {
            let name = code.as_str();
            assert!(!name.is_empty());
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_single_field_message_is_promoted() {
        let err = ApiError::validation_field("email", "Invalid email format");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Invalid email format");
        assert_eq!(
            err.field_messages("email"),
            Some(&["Invalid email format".to_string()][..])
        );
    }

    #[test]
    fn test_multi_field_message_counts() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("name", "Name is required");
        builder.add("phone", "Phone number is too short");

        let err = builder.build().unwrap();
        assert_eq!(err.message, "Validation failed for 2 fields");
    }

    #[test]
    fn test_builder_accumulates_per_field() {
        let mut builder = ValidationErrorBuilder::new();
        assert!(builder.is_empty());

        builder.add("name", "Name is required");
        builder.add("name", "Name contains control characters");
        assert!(!builder.is_empty());

        let err = builder.build().unwrap();
        assert_eq!(err.field_messages("name").map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_empty_builder_finishes_ok() {
        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_envelope_shape() {
        let err = ApiError::not_found("Lead not found");
        let value = serde_json::to_value(Envelope {
            error: Payload {
                code: err.code.as_str(),
                message: err.message.clone(),
                details: None,
            },
        })
        .unwrap();

        assert_eq!(value["error"]["code"], "not_found");
        assert_eq!(value["error"]["message"], "Lead not found");
        assert!(value["error"].get("details").is_none());
    }

    #[test]
    fn test_sqlx_mapping() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
