/// Task endpoints
///
/// # Endpoints
///
/// - `POST /v1/tasks` - Create a task on a board (ADMIN)
/// - `GET /v1/tasks/:id` - Task with its comment thread (MEMBER)
/// - `PUT /v1/tasks/:id` - Partial update, e.g. a drag to another column (ADMIN)
/// - `DELETE /v1/tasks/:id` - Delete with its comments (ADMIN)
///
/// Assigning a task is premium-only and the assignee must be a member of the
/// task's project. A new assignee is told over their user channel.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        auth::MessageResponse,
        projects::{double_option, required_text},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use projexy_shared::{
    auth::{
        authorization::{require_access, Resource},
        middleware::AuthContext,
    },
    models::{
        comment::{Comment, CommentWithAuthor},
        membership::{Membership, ProjectRole},
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
        user::Plan,
    },
    plan::{require_feature, Feature},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const TITLE_REQUIRED: &str = "Task title is required.";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

/// Partial update; absent fields are left alone, `null` clears a nullable one
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title cannot be empty"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateTaskRequest {
    /// Trims a supplied title; a blank one is rejected
    fn normalize_title(&mut self) -> ApiResult<()> {
        if let Some(title) = self.title.take() {
            self.title = Some(required_text(&title, TITLE_REQUIRED)?);
        }
        Ok(())
    }
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            assignee_id: req.assignee_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TaskDetailResponse {
    pub task: Task,
    pub comments: Vec<CommentWithAuthor>,
    pub user_role: ProjectRole,
}

/// Checks that `assignee_id` may be given a task in `project_id` by a user on `plan`
async fn ensure_assignable(
    state: &AppState,
    plan: Plan,
    project_id: Uuid,
    assignee_id: Uuid,
) -> ApiResult<()> {
    require_feature(plan, Feature::AssignTasks)?;

    if !Membership::is_member(&state.db, project_id, assignee_id).await? {
        return Err(ApiError::BadRequest(
            "Assignee must be a member of the project.".to_string(),
        ));
    }

    Ok(())
}

/// The user to notify after an assignment change, if any
pub(crate) fn newly_assigned(previous: Option<Uuid>, current: Option<Uuid>) -> Option<Uuid> {
    match current {
        Some(assignee) if previous != Some(assignee) => Some(assignee),
        _ => None,
    }
}

/// Create a task
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an ADMIN of the project, or assigns on FREE
/// - `404 Not Found`: unknown project
/// - `400 Bad Request`: missing title or assignee outside the project
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    req.validate()?;
    let title = required_text(&req.title, TITLE_REQUIRED)?;
    require_access(&state.db, auth.user_id, Resource::Project(req.project_id), ProjectRole::Admin)
        .await?;

    if let Some(assignee_id) = req.assignee_id {
        ensure_assignable(&state, auth.plan, req.project_id, assignee_id).await?;
    }

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id: req.project_id,
            title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            assignee_id: req.assignee_id,
        },
    )
    .await?;

    tracing::info!(task_id = %task.id, project_id = %task.project_id, "Task created");

    if let Some(assignee_id) = task.assignee_id {
        state.notifier.task_assigned(assignee_id, &auth.name, &task).await;
    }

    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskDetailResponse>> {
    let access = require_access(&state.db, auth.user_id, Resource::Task(id), ProjectRole::Member).await?;

    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    let comments = Comment::list_by_task(&state.db, id).await?;

    Ok(Json(TaskDetailResponse {
        task,
        comments,
        user_role: access.effective_role(auth.user_id).unwrap_or(ProjectRole::Member),
    }))
}

/// Update a task
///
/// Only the supplied fields change. When the assignee changes to a user, that
/// user gets a `new-task` event; the push is best effort.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    req.validate()?;
    req.normalize_title()?;
    let access = require_access(&state.db, auth.user_id, Resource::Task(id), ProjectRole::Admin).await?;

    let previous = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if let Some(Some(assignee_id)) = req.assignee_id {
        if previous.assignee_id != Some(assignee_id) {
            ensure_assignable(&state, auth.plan, access.project_id, assignee_id).await?;
        }
    }

    let update = UpdateTask::from(req);
    if update.is_empty() {
        return Ok(Json(TaskResponse { task: previous }));
    }

    let task = Task::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if let Some(assignee_id) = newly_assigned(previous.assignee_id, task.assignee_id) {
        state.notifier.task_assigned(assignee_id, &auth.name, &task).await;
    }

    Ok(Json(TaskResponse { task }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_access(&state.db, auth.user_id, Resource::Task(id), ProjectRole::Admin).await?;

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task deleted");

    Ok(MessageResponse::new("Task deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newly_assigned() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(newly_assigned(None, Some(a)), Some(a));
        assert_eq!(newly_assigned(Some(a), Some(b)), Some(b));
        assert_eq!(newly_assigned(Some(a), Some(a)), None);
        assert_eq!(newly_assigned(Some(a), None), None);
        assert_eq!(newly_assigned(None, None), None);
    }

    #[test]
    fn test_update_request_partial_fields() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status":"IN_PROGRESS"}"#).unwrap();
        let update = UpdateTask::from(req);

        assert_eq!(update.status, Some(TaskStatus::InProgress));
        assert!(update.assignee_id.is_none());
        assert!(update.due_date.is_none());
    }

    #[test]
    fn test_update_request_clears_assignee() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"assignee_id":null}"#).unwrap();
        assert_eq!(req.assignee_id, Some(None));

        let empty: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert!(UpdateTask::from(empty).is_empty());
    }

    #[test]
    fn test_update_request_title_is_trimmed() {
        let mut req: UpdateTaskRequest =
            serde_json::from_str(r#"{"title":"  Ship beta  "}"#).unwrap();
        req.normalize_title().unwrap();
        assert_eq!(req.title.as_deref(), Some("Ship beta"));

        let mut blank: UpdateTaskRequest = serde_json::from_str(r#"{"title":"   "}"#).unwrap();
        assert!(blank.validate().is_ok());
        assert!(matches!(
            blank.normalize_title(),
            Err(ApiError::BadRequest(message)) if message == TITLE_REQUIRED
        ));

        let mut untouched: UpdateTaskRequest = serde_json::from_str(r#"{"priority":"HIGH"}"#).unwrap();
        untouched.normalize_title().unwrap();
        assert!(untouched.title.is_none());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest = serde_json::from_str(&format!(
            r#"{{"project_id":"{}","title":"Write launch post"}}"#,
            Uuid::nil()
        ))
        .unwrap();

        assert_eq!(req.status, TaskStatus::Todo);
        assert_eq!(req.priority, TaskPriority::Medium);
        assert!(req.validate().is_ok());
    }
}
