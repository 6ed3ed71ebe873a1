/// Database models for ProjeXY
///
/// Each model owns its SQL; handlers never build queries directly.
///
/// # Models
///
/// - `user`: accounts, subscription plan, one-time token state
/// - `project`: projects and the plan-gated creation transaction
/// - `membership`: per-project roles (ADMIN / MEMBER)
/// - `task`: kanban tasks
/// - `comment`: task comments with attachments
///
/// Cascades: project → memberships, tasks → comments.

pub mod comment;
pub mod membership;
pub mod project;
pub mod task;
pub mod user;
