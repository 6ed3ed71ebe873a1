/// Comment model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     text TEXT NOT NULL,
///     attachments JSONB NOT NULL DEFAULT '[]'::jsonb,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Attachments are references to already-uploaded files (URL + display name);
/// the upload itself happens elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub attachments: Json<Vec<Attachment>>,
    pub created_at: DateTime<Utc>,
}

/// A comment with its author's display fields, as shown in a task thread
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
    pub author_image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Comment {
    /// Stores a comment and returns it with the author's display fields
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<CommentWithAuthor, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (task_id, author_id, text, attachments)
                VALUES ($1, $2, $3, $4)
                RETURNING id, task_id, author_id, text, attachments, created_at
            )
            SELECT i.id, i.task_id, i.author_id, i.text, i.attachments, i.created_at,
                   u.name AS author_name, u.image_url AS author_image_url
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(data.task_id)
        .bind(data.author_id)
        .bind(data.text)
        .bind(Json(data.attachments))
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, author_id, text, attachments, created_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a task's comments, oldest first
    pub async fn list_by_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.task_id, c.author_id, c.text, c.attachments, c.created_at,
                   u.name AS author_name, u.image_url AS author_image_url
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_serializes_attachments_as_array() {
        let comment = CommentWithAuthor {
            comment: Comment {
                id: Uuid::new_v4(),
                task_id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                text: "See the mockup".to_string(),
                attachments: Json(vec![Attachment {
                    url: "https://files.example.com/mockup.png".to_string(),
                    filename: "mockup.png".to_string(),
                }]),
                created_at: Utc::now(),
            },
            author_name: "Grace".to_string(),
            author_image_url: None,
        };

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["text"], "See the mockup");
        assert_eq!(json["author_name"], "Grace");
        assert_eq!(json["attachments"][0]["filename"], "mockup.png");
    }
}
