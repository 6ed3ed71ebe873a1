/// Project endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects` - Projects the caller belongs to
/// - `POST /v1/projects` - Create a project (plan gated)
/// - `GET /v1/projects/:id` - Board view: project, tasks, members, caller's role
/// - `PUT /v1/projects/:id` - Rename / describe (ADMIN)
/// - `DELETE /v1/projects/:id` - Delete with everything in it (owner)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::MessageResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use projexy_shared::{
    auth::{
        authorization::{require_access, require_owner, Resource},
        middleware::AuthContext,
    },
    models::{
        membership::{MemberWithUser, Membership, ProjectRole},
        project::{CreateProject, Project, ProjectWithRole, UpdateProject},
        task::Task,
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Project name is required."))]
    pub name: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Project name cannot be empty"))]
    pub name: Option<String>,

    /// Absent leaves the description alone; `null` clears it
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Trims `value`, rejecting it with `message` when nothing is left
pub(crate) fn required_text(value: &str, message: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectWithRole>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailResponse {
    pub project: Project,
    pub tasks: Vec<Task>,
    pub members: Vec<MemberWithUser>,
    pub current_user_role: ProjectRole,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProjectListResponse>> {
    let projects = Project::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(ProjectListResponse { projects }))
}

/// Create a project
///
/// The caller becomes its owner and an ADMIN member.
///
/// # Errors
///
/// - `400 Bad Request`: missing name
/// - `403 Forbidden` with `"upgrade": true`: FREE plan already owns 3 projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    req.validate()?;

    let name = required_text(&req.name, "Project name is required.")?;

    let project = Project::create_with_owner(
        &state.db,
        CreateProject {
            name,
            description: req.description,
            owner_id: auth.user_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ProjectResponse { project })))
}

/// Board view of one project
///
/// Non-members get `404` so project ids can't be probed.
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetailResponse>> {
    let found = Project::find_for_member(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Project not found or you do not have access.".to_string())
        })?;

    let tasks = Task::list_by_project(&state.db, id).await?;
    let members = Membership::list_members_with_users(&state.db, id).await?;

    let current_user_role = if found.project.owner_id == auth.user_id {
        ProjectRole::Admin
    } else {
        found.role
    };

    Ok(Json(ProjectDetailResponse {
        project: found.project,
        tasks,
        members,
        current_user_role,
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    req.validate()?;
    let name = req
        .name
        .as_deref()
        .map(|name| required_text(name, "Project name is required."))
        .transpose()?;
    require_access(&state.db, auth.user_id, Resource::Project(id), ProjectRole::Admin).await?;

    let project = Project::update(
        &state.db,
        id,
        UpdateProject {
            name,
            description: req.description,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(Json(ProjectResponse { project }))
}

/// Delete a project; tasks, comments and memberships go with it
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_owner(&state.db, auth.user_id, id).await?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");

    Ok(MessageResponse::new("Project deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("  Roadmap  ", "required").unwrap(), "Roadmap");
        assert!(matches!(
            required_text(" \t ", "Project name is required."),
            Err(ApiError::BadRequest(message)) if message == "Project name is required."
        ));
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateProjectRequest = serde_json::from_str(r#"{"name":"Roadmap"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: UpdateProjectRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateProjectRequest =
            serde_json::from_str(r#"{"description":"Q3 launch"}"#).unwrap();
        assert_eq!(set.description, Some(Some("Q3 launch".to_string())));
    }

    #[test]
    fn test_create_request_requires_name() {
        let req = CreateProjectRequest {
            name: String::new(),
            description: None,
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("name"));
    }
}
