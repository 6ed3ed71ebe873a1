/// API route handlers
///
/// - `health`: liveness and database status
/// - `auth`: registration, login, token refresh, email verification, password reset
/// - `users`: the caller's own account
/// - `projects`: project CRUD
/// - `members`: invites, role changes, removal
/// - `tasks`: task CRUD and assignment
/// - `comments`: task comments
/// - `realtime`: channel authorization and SSE subscription
/// - `webhooks`: payment-processor events

pub mod auth;
pub mod comments;
pub mod health;
pub mod members;
pub mod projects;
pub mod realtime;
pub mod tasks;
pub mod users;
pub mod webhooks;
