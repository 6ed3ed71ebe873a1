/// Plan gate: project limits and premium feature flags
///
/// Every user is on one of two plans. FREE users may own at most three
/// projects and cannot use collaboration features; PREMIUM users are
/// unlimited.
///
/// | Plan    | Owned projects | Premium features |
/// |---------|----------------|------------------|
/// | FREE    | 3              | none             |
/// | PREMIUM | unlimited      | all              |
///
/// Refusals carry their own error type ([`PlanError::UpgradeRequired`],
/// [`PlanError::FeatureLocked`]) so callers can answer with an upgrade prompt
/// instead of a generic failure.
///
/// # Example
///
/// ```
/// use projexy_shared::models::user::Plan;
/// use projexy_shared::plan::{check_project_creation, require_feature, Feature};
///
/// assert!(check_project_creation(Plan::Free, 2).allowed);
/// assert!(!check_project_creation(Plan::Free, 3).allowed);
/// assert!(check_project_creation(Plan::Premium, 300).allowed);
///
/// assert!(require_feature(Plan::Free, Feature::InviteMembers).is_err());
/// assert!(require_feature(Plan::Premium, Feature::InviteMembers).is_ok());
/// ```

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::user::Plan;

/// Maximum number of projects a FREE user may own
pub const FREE_PLAN_PROJECT_LIMIT: u32 = 3;

/// Plan gate error
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Owned-project limit reached on the current plan
    #[error("Project limit reached ({current}/{limit}); upgrade to create more projects")]
    UpgradeRequired { limit: u32, current: u32 },

    /// Feature is not included in the current plan
    #[error("{} requires a premium plan", .0.as_str())]
    FeatureLocked(Feature),

    /// User row vanished while the gate was evaluated
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl PlanError {
    /// Whether this refusal should be presented as an upgrade prompt
    pub fn is_upgrade_signal(&self) -> bool {
        matches!(self, PlanError::UpgradeRequired { .. } | PlanError::FeatureLocked(_))
    }
}

/// Premium-only features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Adding other users to a project
    InviteMembers,

    /// Assigning tasks to project members
    AssignTasks,

    /// Generated task descriptions
    AiDescriptions,

    /// Commenting on tasks
    Comments,

    /// Attaching files to comments
    Attachments,

    /// Embedded project video room
    VideoChat,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::InviteMembers => "Inviting members",
            Feature::AssignTasks => "Task assignment",
            Feature::AiDescriptions => "AI task descriptions",
            Feature::Comments => "Comments",
            Feature::Attachments => "Attachments",
            Feature::VideoChat => "Video chat",
        }
    }

    pub const ALL: [Feature; 6] = [
        Feature::InviteMembers,
        Feature::AssignTasks,
        Feature::AiDescriptions,
        Feature::Comments,
        Feature::Attachments,
        Feature::VideoChat,
    ];
}

impl Plan {
    /// Whether `feature` is available on this plan
    ///
    /// Every feature in [`Feature`] is premium-only.
    pub fn allows(&self, _feature: Feature) -> bool {
        self.is_premium()
    }
}

/// Limits attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Maximum owned projects (`None` = unlimited)
    pub max_owned_projects: Option<u32>,
}

impl PlanLimits {
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Free => PlanLimits {
                max_owned_projects: Some(FREE_PLAN_PROJECT_LIMIT),
            },
            Plan::Premium => PlanLimits {
                max_owned_projects: None,
            },
        }
    }
}

/// Outcome of a project-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCheckResult {
    pub allowed: bool,
    pub current: u32,
    pub limit: Option<u32>,
}

/// Decides whether a user with `owned` projects may create another one
pub fn check_project_creation(plan: Plan, owned: u32) -> PlanCheckResult {
    let limit = PlanLimits::for_plan(plan).max_owned_projects;

    PlanCheckResult {
        allowed: limit.map_or(true, |max| owned < max),
        current: owned,
        limit,
    }
}

/// Refuses with [`PlanError::FeatureLocked`] unless `plan` includes `feature`
pub fn require_feature(plan: Plan, feature: Feature) -> Result<(), PlanError> {
    if plan.allows(feature) {
        Ok(())
    } else {
        Err(PlanError::FeatureLocked(feature))
    }
}

/// Enforces the owned-project limit inside an open transaction
///
/// Takes a row lock on the owner before counting, so concurrent creations by
/// the same user serialize and cannot both pass the check. The lock is held
/// until the caller's transaction ends; the caller inserts the project in the
/// same transaction.
///
/// # Errors
///
/// - `PlanError::UpgradeRequired` when the limit is reached
/// - `PlanError::UserNotFound` when the owner does not exist
pub async fn enforce_project_limit(
    conn: &mut PgConnection,
    owner_id: Uuid,
) -> Result<(), PlanError> {
    let plan: Option<Plan> = sqlx::query_scalar("SELECT plan FROM users WHERE id = $1 FOR UPDATE")
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await?;

    let plan = plan.ok_or(PlanError::UserNotFound(owner_id))?;

    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await?;

    let result = check_project_creation(plan, owned.max(0) as u32);

    match result.limit {
        Some(limit) if !result.allowed => {
            tracing::info!(
                user_id = %owner_id,
                current = result.current,
                limit,
                "Project creation refused by plan limit"
            );
            Err(PlanError::UpgradeRequired {
                limit,
                current: result.current,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_limits() {
        assert_eq!(PlanLimits::for_plan(Plan::Free).max_owned_projects, Some(3));
        assert_eq!(PlanLimits::for_plan(Plan::Premium).max_owned_projects, None);
    }

    #[test]
    fn test_free_plan_allows_up_to_three_projects() {
        for owned in 0..3 {
            assert!(check_project_creation(Plan::Free, owned).allowed);
        }

        let fourth = check_project_creation(Plan::Free, 3);
        assert!(!fourth.allowed);
        assert_eq!(fourth.current, 3);
        assert_eq!(fourth.limit, Some(3));
    }

    #[test]
    fn test_premium_plan_is_unlimited() {
        let result = check_project_creation(Plan::Premium, 10_000);
        assert!(result.allowed);
        assert_eq!(result.limit, None);
    }

    #[test]
    fn test_feature_flags() {
        for feature in Feature::ALL {
            assert!(!Plan::Free.allows(feature), "{:?} must be premium-only", feature);
            assert!(Plan::Premium.allows(feature));
        }
    }

    #[test]
    fn test_require_feature() {
        let err = require_feature(Plan::Free, Feature::AssignTasks).unwrap_err();
        assert!(matches!(err, PlanError::FeatureLocked(Feature::AssignTasks)));
        assert!(err.is_upgrade_signal());

        assert!(require_feature(Plan::Premium, Feature::Comments).is_ok());
    }

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::UpgradeRequired { limit: 3, current: 3 };
        assert!(err.to_string().contains("3/3"));
        assert!(err.is_upgrade_signal());

        let err = PlanError::FeatureLocked(Feature::VideoChat);
        assert_eq!(err.to_string(), "Video chat requires a premium plan");

        let err = PlanError::UserNotFound(Uuid::nil());
        assert!(!err.is_upgrade_signal());
    }
}
