/// Project model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Deleting a project cascades to its memberships, tasks, and (through tasks)
/// comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::membership::ProjectRole;
use crate::plan::{self, PlanError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project together with the caller's role in it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,

    /// Use Some(None) to clear
    pub description: Option<Option<String>>,
}

impl Project {
    /// Creates a project and the owner's ADMIN membership
    ///
    /// Runs in one transaction: the owner row is locked, the plan's
    /// owned-project limit is enforced, then the project and membership rows
    /// are inserted.
    ///
    /// # Errors
    ///
    /// - `PlanError::UpgradeRequired` if a FREE owner already has 3 projects
    /// - `PlanError::UserNotFound` if the owner doesn't exist
    /// - `PlanError::DatabaseError` on any database failure
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use projexy_shared::models::project::{Project, CreateProject};
    /// # use projexy_shared::plan::PlanError;
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    /// match Project::create_with_owner(&pool, CreateProject {
    ///     name: "Website relaunch".to_string(),
    ///     description: None,
    ///     owner_id,
    /// }).await {
    ///     Ok(project) => println!("Created {}", project.id),
    ///     Err(PlanError::UpgradeRequired { .. }) => println!("Upgrade to create more projects"),
    ///     Err(e) => return Err(e.into()),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_with_owner(pool: &PgPool, data: CreateProject) -> Result<Self, PlanError> {
        let mut tx = pool.begin().await?;

        plan::enforce_project_limit(&mut tx, data.owner_id).await?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role) VALUES ($1, $2, $3)",
        )
        .bind(project.id)
        .bind(data.owner_id)
        .bind(ProjectRole::Admin)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, owner_id, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a project only if `user_id` is a member of it
    ///
    /// Returns the caller's role alongside the project.
    pub async fn find_for_member(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectWithRole>, sqlx::Error> {
        sqlx::query_as::<_, ProjectWithRole>(
            r#"
            SELECT p.id, p.name, p.description, p.owner_id, p.created_at, p.updated_at, m.role
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE p.id = $1 AND m.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists every project the user belongs to, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ProjectWithRole>, sqlx::Error> {
        sqlx::query_as::<_, ProjectWithRole>(
            r#"
            SELECT p.id, p.name, p.description, p.owner_id, p.created_at, p.updated_at, m.role
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Number of projects owned by a user
    pub async fn count_owned_by(pool: &PgPool, owner_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(pool)
            .await
    }

    /// Applies a partial update
    ///
    /// # Returns
    ///
    /// The updated project, `None` if it doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let clear_description = matches!(data.description, Some(None));
        let description = data.description.flatten();

        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = CASE WHEN $4 THEN NULL ELSE COALESCE($3, description) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(description)
        .bind(clear_description)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a project and, by cascade, its memberships, tasks and comments
    ///
    /// # Returns
    ///
    /// True if the project existed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
