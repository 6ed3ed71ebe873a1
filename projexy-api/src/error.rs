/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]; library errors convert into
/// [`ApiError`] with `?`, and `ApiError` renders as
///
/// ```json
/// { "error": "forbidden", "message": "Not authorized to access this task" }
/// ```
///
/// Plan refusals carry `"upgrade": true` so clients can show an upgrade
/// prompt instead of a bare failure; validation errors carry `details`.
/// Internal errors are logged and returned as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use projexy_shared::{
    auth::{
        authorization::AccessError, jwt::JwtError, middleware::AuthError, password::PasswordError,
    },
    billing::WebhookError,
    plan::PlanError,
    realtime::channel_auth::ChannelAuthError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Plan limit or premium feature (403 with the upgrade signal)
    UpgradeRequired(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or membership
    Conflict(String),

    /// Request validation failed (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "upgrade_required")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::UpgradeRequired(msg) => write!(f, "Upgrade required: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::UpgradeRequired(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details, upgrade) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None, None),
            ApiError::UpgradeRequired(msg) => ("upgrade_required", msg, None, Some(true)),
            ApiError::NotFound(msg) => ("not_found", msg, None, None),
            ApiError::Conflict(msg) => ("conflict", msg, None, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
                None,
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("internal_error", "An internal error occurred".to_string(), None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
            upgrade,
        });

        (status, body).into_response()
    }
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                let constraint = db_err.constraint().unwrap_or_default();

                if code.as_deref() == Some(UNIQUE_VIOLATION) {
                    if constraint.contains("email") {
                        return ApiError::Conflict("User with this email already exists.".to_string());
                    }
                    if constraint.starts_with("project_members") {
                        return ApiError::Conflict("User is already a member of this project.".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                if code.as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                    return ApiError::BadRequest("Referenced resource does not exist".to_string());
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::Unauthorized(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::UnknownUser => ApiError::Unauthorized("Unknown user".to_string()),
            AuthError::DatabaseError(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(_) => ApiError::NotFound(capitalize(&err.to_string())),
            AccessError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            AccessError::DatabaseError(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::UpgradeRequired { .. } | PlanError::FeatureLocked(_) => {
                ApiError::UpgradeRequired(err.to_string())
            }
            PlanError::UserNotFound(_) => ApiError::Unauthorized("Unknown user".to_string()),
            PlanError::DatabaseError(e) => ApiError::from(e),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::DatabaseError(e) => {
                ApiError::InternalError(format!("Webhook database update failed: {}", e))
            }
            other => ApiError::BadRequest(format!("Webhook Error: {}", other)),
        }
    }
}

impl From<ChannelAuthError> for ApiError {
    fn from(err: ChannelAuthError) -> Self {
        match err {
            ChannelAuthError::InvalidSocketId => ApiError::BadRequest(err.to_string()),
            ChannelAuthError::InvalidKey => ApiError::InternalError(err.to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
