/// Comment endpoints
///
/// - `POST /v1/comments` - Comment on a task (MEMBER, premium)
/// - `DELETE /v1/comments/:id` - Delete (author, owner or ADMIN)

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
        authorization::{load_access, may_delete_comment, require_access, Resource},
        middleware::AuthContext,
    },
    models::{
        comment::{Attachment, Comment, CommentWithAuthor, CreateComment},
        membership::ProjectRole,
    },
    plan::{require_feature, Feature},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Most attachments a single comment may reference
const MAX_ATTACHMENTS: usize = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub task_id: Uuid,

    #[validate(length(min = 1, max = 10_000, message = "Comment text is required."))]
    pub text: String,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn check_attachments(attachments: &[Attachment]) -> ApiResult<()> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(ApiError::BadRequest(format!(
            "A comment can have at most {} attachments.",
            MAX_ATTACHMENTS
        )));
    }

    if attachments.iter().any(|a| a.url.trim().is_empty() || a.filename.trim().is_empty()) {
        return Err(ApiError::BadRequest("Attachments need a url and a filename.".to_string()));
    }

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: CommentWithAuthor,
}

/// Post a comment
///
/// Everyone subscribed to the project's channel receives the new comment.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    req.validate()?;

    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Comment text is required.".to_string()));
    }
    check_attachments(&req.attachments)?;

    let access =
        require_access(&state.db, auth.user_id, Resource::Task(req.task_id), ProjectRole::Member)
            .await?;

    require_feature(auth.plan, Feature::Comments)?;
    if !req.attachments.is_empty() {
        require_feature(auth.plan, Feature::Attachments)?;
    }

    let comment = Comment::create(
        &state.db,
        CreateComment {
            task_id: req.task_id,
            author_id: auth.user_id,
            text: req.text,
            attachments: req.attachments,
        },
    )
    .await?;

    tracing::debug!(comment_id = %comment.comment.id, task_id = %req.task_id, "Comment created");

    state.notifier.comment_created(access.project_id, &comment).await;

    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// Delete a comment
///
/// # Errors
///
/// - `403 Forbidden`: not the author and no ADMIN access
/// - `404 Not Found`: unknown comment, or caller is not in the project
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let not_found = || ApiError::NotFound("Comment not found".to_string());

    let access = load_access(&state.db, auth.user_id, Resource::Comment(id))
        .await?
        .ok_or_else(not_found)?;

    if !access.allows(auth.user_id, ProjectRole::Member) {
        return Err(not_found());
    }

    let comment = Comment::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;

    if !may_delete_comment(&access, auth.user_id, comment.author_id) {
        return Err(ApiError::Forbidden(
            "You are not authorized to delete this comment.".to_string(),
        ));
    }

    Comment::delete(&state.db, id).await?;

    Ok(MessageResponse::new("Comment deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachments_default_to_empty() {
        let req: CreateCommentRequest = serde_json::from_str(&format!(
            r#"{{"task_id":"{}","text":"Looks good"}}"#,
            Uuid::nil()
        ))
        .unwrap();

        assert!(req.attachments.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let req = CreateCommentRequest {
            task_id: Uuid::nil(),
            text: String::new(),
            attachments: Vec::new(),
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("text"));
    }

    #[test]
    fn test_attachment_limit() {
        let attachment = Attachment {
            url: "https://cdn.example.com/wireframes.pdf".to_string(),
            filename: "wireframes.pdf".to_string(),
        };
        assert!(check_attachments(&vec![attachment.clone(); MAX_ATTACHMENTS]).is_ok());
        assert!(check_attachments(&vec![attachment; MAX_ATTACHMENTS + 1]).is_err());

        let unnamed = Attachment {
            url: "https://cdn.example.com/x".to_string(),
            filename: " ".to_string(),
        };
        assert!(check_attachments(&[unnamed]).is_err());
    }
}
