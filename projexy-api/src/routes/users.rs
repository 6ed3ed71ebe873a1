/// Account endpoints for the signed-in user
///
/// # Endpoints
///
/// - `GET /v1/users/me` - Current session user
/// - `POST /v1/users/change-password` - Change password (requires the current one)
/// - `POST /v1/users/update-profile` - Set or clear the profile picture

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::{check_password_strength, MessageResponse, SessionUser},
};
use axum::{extract::State, Extension, Json};
use projexy_shared::{auth::middleware::AuthContext, auth::password, models::user::User};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// New picture URL; `null` removes the picture
    #[serde(alias = "imageUrl")]
    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: SessionUser,
}

/// Current user, as seen by the authentication layer
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<SessionUser> {
    Json(SessionUser {
        id: auth.user_id,
        name: auth.name,
        email: auth.email,
        image: auth.image_url,
        plan: auth.plan,
    })
}

/// Change password
///
/// # Errors
///
/// - `400 Bad Request`: wrong current password or weak new password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;
    check_password_strength("new_password", &req.new_password)?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    if !password::verify_password_async(req.current_password, user.password_hash).await? {
        return Err(ApiError::BadRequest("Incorrect current password.".to_string()));
    }

    let password_hash = password::hash_password_async(req.new_password).await?;
    User::update_password(&state.db, auth.user_id, &password_hash).await?;

    tracing::info!(user_id = %auth.user_id, "Password changed");

    Ok(MessageResponse::new("Password updated successfully."))
}

/// Set or clear the profile picture
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UpdateProfileResponse>> {
    req.validate()?;

    let user = User::update_image(&state.db, auth.user_id, req.image_url.as_deref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile picture updated.".to_string(),
        user: SessionUser::from(&user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_profile_accepts_camel_case() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"imageUrl":"https://cdn.example.com/me.png"}"#).unwrap();
        assert_eq!(req.image_url.as_deref(), Some("https://cdn.example.com/me.png"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_profile_rejects_non_url() {
        let req = UpdateProfileRequest {
            image_url: Some("not a url".to_string()),
        };
        assert!(req.validate().is_err());

        let clear = UpdateProfileRequest { image_url: None };
        assert!(clear.validate().is_ok());
    }

    #[test]
    fn test_change_password_requires_current() {
        let req = ChangePasswordRequest {
            current_password: String::new(),
            new_password: "kanban2024".to_string(),
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("current_password"));
    }
}
