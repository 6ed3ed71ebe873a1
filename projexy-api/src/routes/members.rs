/// Project membership endpoints
///
/// # Endpoints
///
/// - `POST /v1/projects/:id/invite` - Add a registered user by email (ADMIN, premium)
/// - `PUT /v1/projects/:id/members/:user_id` - Change a member's role (owner)
/// - `DELETE /v1/projects/:id/members/:user_id` - Remove a member (ADMIN)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::MessageResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use projexy_shared::{
    auth::{
        authorization::{require_access, require_owner, Resource},
        middleware::AuthContext,
    },
    email::EmailMessage,
    models::{
        membership::{CreateMembership, Membership, ProjectRole},
        project::Project,
        user::User,
    },
    plan::{require_feature, Feature},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: ProjectRole,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub membership: Membership,
}

/// Invite a registered user into the project
///
/// The membership is created first; the notification email is sent
/// afterwards and its failure does not undo the invite.
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an ADMIN, or (with `"upgrade": true`) not premium
/// - `404 Not Found`: no user with that email
/// - `409 Conflict`: already a member
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;
    require_access(&state.db, auth.user_id, Resource::Project(project_id), ProjectRole::Admin).await?;
    require_feature(auth.plan, Feature::InviteMembers)?;

    let invitee = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User with this email not found.".to_string()))?;

    Membership::create(
        &state.db,
        CreateMembership {
            project_id,
            user_id: invitee.id,
            role: ProjectRole::Member,
        },
    )
    .await?;

    tracing::info!(
        project_id = %project_id,
        user_id = %invitee.id,
        invited_by = %auth.user_id,
        "Member invited"
    );

    match Project::find_by_id(&state.db, project_id).await {
        Ok(Some(project)) => state.send_email_in_background(EmailMessage::invite(
            &invitee.email,
            state.base_url(),
            &auth.name,
            &project.name,
            project.id,
        )),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, project_id = %project_id, "Skipping invite email"),
    }

    Ok(MessageResponse::new("Member invited successfully."))
}

/// Change a member's role
///
/// Only the owner may promote or demote; the owner's own membership stays ADMIN.
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let access = require_owner(&state.db, auth.user_id, project_id).await?;

    if access.is_owner(user_id) {
        return Err(ApiError::BadRequest("The project owner's role cannot be changed.".to_string()));
    }

    let membership = Membership::update_role(&state.db, project_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tracing::info!(
        project_id = %project_id,
        user_id = %user_id,
        role = req.role.as_str(),
        "Member role changed"
    );

    Ok(Json(MembershipResponse { membership }))
}

/// Remove a member
///
/// Tasks assigned to the member in this project are unassigned.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let access =
        require_access(&state.db, auth.user_id, Resource::Project(project_id), ProjectRole::Admin)
            .await?;

    if access.is_owner(user_id) {
        return Err(ApiError::BadRequest("The project owner cannot be removed.".to_string()));
    }

    if !Membership::delete(&state.db, project_id, user_id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tracing::info!(project_id = %project_id, user_id = %user_id, removed_by = %auth.user_id, "Member removed");

    Ok(MessageResponse::new("Member removed successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_role_request_uses_wire_names() {
        let req: UpdateRoleRequest = serde_json::from_str(r#"{"role":"ADMIN"}"#).unwrap();
        assert_eq!(req.role, ProjectRole::Admin);

        assert!(serde_json::from_str::<UpdateRoleRequest>(r#"{"role":"OWNER"}"#).is_err());
    }

    #[test]
    fn test_invite_request_validation() {
        let req = InviteRequest {
            email: "nobody".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
