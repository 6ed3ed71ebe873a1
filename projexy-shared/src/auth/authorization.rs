/// Project access control
///
/// Every project, task, and comment belongs to exactly one project, and
/// access is decided at the project:
///
/// 1. The project **owner** may do anything.
/// 2. Otherwise the user needs a **membership** whose role satisfies the
///    required role:
///    - `MEMBER` required: any membership (read, comment)
///    - `ADMIN` required: a membership whose role *is* ADMIN (edit and delete
///      tasks, invite and remove members)
///
/// There is no role ranking; ADMIN is an equality test. A missing resource
/// or a missing membership is a plain `false`, never an error. The
/// `require_*` helpers translate `false` into [`AccessError`] for handlers.
///
/// # Example
///
/// ```no_run
/// use projexy_shared::auth::authorization::{can_access, Resource};
/// use projexy_shared::models::membership::ProjectRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, task_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// if can_access(&pool, user_id, Resource::Task(task_id), ProjectRole::Admin).await? {
///     println!("user may edit the task");
/// }
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::membership::ProjectRole;

/// Error type for access checks
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The resource does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The resource exists but the user lacks the required role
    #[error("Not authorized to access this {0}")]
    Forbidden(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// A resource whose access is governed by its project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Project(Uuid),
    Task(Uuid),
    Comment(Uuid),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Project(_) => "project",
            Resource::Task(_) => "task",
            Resource::Comment(_) => "comment",
        }
    }
}

/// What the access rule needs to know about a user's standing in a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProjectAccess {
    pub project_id: Uuid,
    pub owner_id: Uuid,

    /// The user's membership role, `None` if not a member
    pub role: Option<ProjectRole>,
}

impl ProjectAccess {
    /// Applies the access rule for `user_id`
    pub fn allows(&self, user_id: Uuid, required: ProjectRole) -> bool {
        role_satisfies(self.owner_id == user_id, self.role, required)
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// The role reported to clients; the owner always counts as ADMIN
    pub fn effective_role(&self, user_id: Uuid) -> Option<ProjectRole> {
        if self.is_owner(user_id) {
            Some(ProjectRole::Admin)
        } else {
            self.role
        }
    }
}

/// The access rule, free of any lookup
pub fn role_satisfies(is_owner: bool, membership: Option<ProjectRole>, required: ProjectRole) -> bool {
    if is_owner {
        return true;
    }

    match (required, membership) {
        (ProjectRole::Member, Some(_)) => true,
        (ProjectRole::Admin, Some(role)) => role == ProjectRole::Admin,
        (_, None) => false,
    }
}

/// A comment may be deleted by its author or by anyone with ADMIN access
pub fn may_delete_comment(access: &ProjectAccess, user_id: Uuid, author_id: Uuid) -> bool {
    author_id == user_id || access.allows(user_id, ProjectRole::Admin)
}

/// Loads the owning project's owner and the user's role for `resource`
///
/// # Returns
///
/// `None` if the resource doesn't exist
pub async fn load_access(
    pool: &PgPool,
    user_id: Uuid,
    resource: Resource,
) -> Result<Option<ProjectAccess>, sqlx::Error> {
    let query = match resource {
        Resource::Project(_) => {
            r#"
            SELECT p.id AS project_id, p.owner_id, m.role
            FROM projects p
            LEFT JOIN project_members m ON m.project_id = p.id AND m.user_id = $2
            WHERE p.id = $1
            "#
        }
        Resource::Task(_) => {
            r#"
            SELECT p.id AS project_id, p.owner_id, m.role
            FROM tasks t
            JOIN projects p ON p.id = t.project_id
            LEFT JOIN project_members m ON m.project_id = p.id AND m.user_id = $2
            WHERE t.id = $1
            "#
        }
        Resource::Comment(_) => {
            r#"
            SELECT p.id AS project_id, p.owner_id, m.role
            FROM comments c
            JOIN tasks t ON t.id = c.task_id
            JOIN projects p ON p.id = t.project_id
            LEFT JOIN project_members m ON m.project_id = p.id AND m.user_id = $2
            WHERE c.id = $1
            "#
        }
    };

    let id = match resource {
        Resource::Project(id) | Resource::Task(id) | Resource::Comment(id) => id,
    };

    sqlx::query_as::<_, ProjectAccess>(query)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Whether `user_id` may act on `resource` with `required` role
///
/// Unknown resources yield `Ok(false)`. Only a database failure is an error.
pub async fn can_access(
    pool: &PgPool,
    user_id: Uuid,
    resource: Resource,
    required: ProjectRole,
) -> Result<bool, sqlx::Error> {
    Ok(load_access(pool, user_id, resource)
        .await?
        .map_or(false, |access| access.allows(user_id, required)))
}

/// Like [`can_access`], but distinguishes a missing resource from a refusal
///
/// # Returns
///
/// The loaded [`ProjectAccess`] so callers can reuse the project id and role
///
/// # Errors
///
/// - `AccessError::NotFound` if the resource doesn't exist
/// - `AccessError::Forbidden` if the rule refuses
pub async fn require_access(
    pool: &PgPool,
    user_id: Uuid,
    resource: Resource,
    required: ProjectRole,
) -> Result<ProjectAccess, AccessError> {
    let access = load_access(pool, user_id, resource)
        .await?
        .ok_or(AccessError::NotFound(resource.kind()))?;

    if access.allows(user_id, required) {
        Ok(access)
    } else {
        tracing::debug!(
            user_id = %user_id,
            project_id = %access.project_id,
            resource = resource.kind(),
            required = required.as_str(),
            "Access refused"
        );
        Err(AccessError::Forbidden(resource.kind()))
    }
}

/// Only the project owner passes
pub async fn require_owner(
    pool: &PgPool,
    user_id: Uuid,
    project_id: Uuid,
) -> Result<ProjectAccess, AccessError> {
    let access = load_access(pool, user_id, Resource::Project(project_id))
        .await?
        .ok_or(AccessError::NotFound("project"))?;

    if access.is_owner(user_id) {
        Ok(access)
    } else {
        Err(AccessError::Forbidden("project"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MEMBERSHIPS: [Option<ProjectRole>; 3] =
        [None, Some(ProjectRole::Member), Some(ProjectRole::Admin)];

    #[test]
    fn test_owner_always_allowed() {
        for membership in ALL_MEMBERSHIPS {
            assert!(role_satisfies(true, membership, ProjectRole::Member));
            assert!(role_satisfies(true, membership, ProjectRole::Admin));
        }
    }

    #[test]
    fn test_member_required_accepts_any_membership() {
        assert!(!role_satisfies(false, None, ProjectRole::Member));
        assert!(role_satisfies(false, Some(ProjectRole::Member), ProjectRole::Member));
        assert!(role_satisfies(false, Some(ProjectRole::Admin), ProjectRole::Member));
    }

    #[test]
    fn test_admin_required_is_equality() {
        assert!(!role_satisfies(false, None, ProjectRole::Admin));
        assert!(!role_satisfies(false, Some(ProjectRole::Member), ProjectRole::Admin));
        assert!(role_satisfies(false, Some(ProjectRole::Admin), ProjectRole::Admin));
    }

    #[test]
    fn test_project_access_allows() {
        let owner = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let member_access = ProjectAccess {
            project_id: Uuid::new_v4(),
            owner_id: owner,
            role: Some(ProjectRole::Member),
        };

        assert!(member_access.allows(owner, ProjectRole::Admin));
        assert!(member_access.allows(outsider, ProjectRole::Member));
        assert!(!member_access.allows(outsider, ProjectRole::Admin));

        let no_membership = ProjectAccess { role: None, ..member_access };
        assert!(!no_membership.allows(outsider, ProjectRole::Member));
        assert!(no_membership.allows(owner, ProjectRole::Member));
    }

    #[test]
    fn test_effective_role() {
        let owner = Uuid::new_v4();
        let access = ProjectAccess {
            project_id: Uuid::new_v4(),
            owner_id: owner,
            role: None,
        };

        assert_eq!(access.effective_role(owner), Some(ProjectRole::Admin));
        assert_eq!(access.effective_role(Uuid::new_v4()), None);
    }

    #[test]
    fn test_may_delete_comment() {
        let author = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let project = Uuid::new_v4();

        let as_member = ProjectAccess {
            project_id: project,
            owner_id: Uuid::new_v4(),
            role: Some(ProjectRole::Member),
        };
        let as_admin = ProjectAccess {
            role: Some(ProjectRole::Admin),
            ..as_member
        };

        assert!(may_delete_comment(&as_member, author, author));
        assert!(may_delete_comment(&as_admin, admin, author));
        assert!(!may_delete_comment(&as_member, member, author));
    }

    #[test]
    fn test_access_error_display() {
        assert_eq!(AccessError::NotFound("task").to_string(), "task not found");
        assert_eq!(
            AccessError::Forbidden("comment").to_string(),
            "Not authorized to access this comment"
        );
    }
}
