/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Create an account, mail the verification link
/// - `POST /v1/auth/login` - Exchange credentials for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
/// - `POST /v1/auth/verify-email` - Redeem a verification token
/// - `POST /v1/auth/forgot-password` - Mail a password-reset link
/// - `POST /v1/auth/reset-password` - Redeem a reset token
///
/// One-time tokens are only ever stored as SHA-256 digests.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Json};
use projexy_shared::{
    auth::{jwt, password, tokens},
    email::EmailMessage,
    models::user::{CreateUser, Plan, User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_VERIFICATION_TOKEN: &str = "Invalid or expired verification token.";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token.";
const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset link has been sent.";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// What the client knows about the signed-in user
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub plan: Plan,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image_url.clone(),
            plan: user.plan,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,

    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Applies the password strength rule, reported as a validation error
pub(crate) fn check_password_strength(field: &str, candidate: &str) -> ApiResult<()> {
    password::validate_password_strength(candidate)
        .map_err(|message| ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)]))
}

/// Register a new user
///
/// ```text
/// POST /v1/auth/register
/// { "name": "Ada", "email": "ada@example.com", "password": "kanban2024" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    req.validate()?;
    check_password_strength("password", &req.password)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("User with this email already exists.".to_string()));
    }

    let password_hash = password::hash_password_async(req.password).await?;
    let (verification_token, verification_token_hash) = tokens::generate_token();

    // A concurrent registration still fails on the unique index (409)
    let user = User::create(
        &state.db,
        CreateUser {
            name: req.name.trim().to_string(),
            email: req.email,
            password_hash,
            verification_token_hash: Some(verification_token_hash),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    state.send_email_in_background(EmailMessage::verification(
        &user.email,
        state.base_url(),
        &verification_token,
    ));

    Ok((
        StatusCode::CREATED,
        MessageResponse::new("User created. Please check your email to verify your account."),
    ))
}

/// Log in
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password
/// - `403 Forbidden`: Email address not verified yet
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let valid = password::verify_password_async(req.password, user.password_hash.clone()).await?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if !user.is_email_verified() {
        return Err(ApiError::Forbidden(
            "Please verify your email before logging in.".to_string(),
        ));
    }

    User::update_last_login(&state.db, user.id).await?;
    let tokens = jwt::issue_token_pair(&user, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        user: SessionUser::from(&user),
        tokens,
    }))
}

/// Exchange a refresh token for a new access token
///
/// The new token carries the plan and picture currently stored for the user,
/// so a subscription change shows up on the next refresh.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    let access = jwt::Claims::for_user(&user, jwt::TokenType::Access);

    Ok(Json(RefreshResponse {
        access_token: jwt::create_token(&access, state.jwt_secret())?,
        token_type: "Bearer".to_string(),
        expires_in: jwt::TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// Redeem an email verification token
///
/// A token works once; a second attempt gets `400`.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !tokens::is_well_formed(&req.token) {
        return Err(ApiError::BadRequest(INVALID_VERIFICATION_TOKEN.to_string()));
    }

    let user = User::verify_email(&state.db, &tokens::hash_token(&req.token))
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_VERIFICATION_TOKEN.to_string()))?;

    tracing::info!(user_id = %user.id, "Email verified");

    Ok(MessageResponse::new("Email verified successfully."))
}

/// Request a password-reset link
///
/// Always answers the same way so the endpoint can't be used to probe for
/// accounts. The lookup and the email happen after the response.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let background = state.clone();
    tokio::spawn(async move {
        if let Err(e) = issue_reset_token(&background, &req.email).await {
            tracing::error!(error = %e, "Failed to issue password reset token");
        }
    });

    Ok(MessageResponse::new(RESET_REQUESTED))
}

async fn issue_reset_token(state: &AppState, email: &str) -> Result<(), sqlx::Error> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let (token, token_hash) = tokens::generate_token();
    User::set_reset_token(&state.db, user.id, &token_hash, tokens::reset_token_expiry()).await?;

    state.send_email_in_background(EmailMessage::password_reset(&user.email, state.base_url(), &token));
    Ok(())
}

/// Redeem a password-reset token
///
/// # Errors
///
/// - `400 Bad Request`: weak password, or unknown, used, or expired token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_password_strength("password", &req.password)?;

    if !tokens::is_well_formed(&req.token) {
        return Err(ApiError::BadRequest(INVALID_RESET_TOKEN.to_string()));
    }

    let password_hash = password::hash_password_async(req.password).await?;

    let user = User::reset_password(&state.db, &tokens::hash_token(&req.token), &password_hash)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_RESET_TOKEN.to_string()))?;

    tracing::info!(user_id = %user.id, "Password reset");

    Ok(MessageResponse::new("Password has been reset successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "kanban2024".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_password_strength_is_validation_error() {
        assert!(check_password_strength("password", "kanban2024").is_ok());
        assert!(matches!(
            check_password_strength("password", "onlyletters"),
            Err(ApiError::ValidationError(details)) if details[0].field == "password"
        ));
    }

    #[test]
    fn test_login_response_flattens_tokens() {
        let response = LoginResponse {
            user: SessionUser {
                id: Uuid::nil(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                image: None,
                plan: Plan::Free,
            },
            tokens: jwt::TokenPair {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 86_400,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["user"]["plan"], "FREE");
    }
}
