/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: session tokens (access + refresh)
/// - [`tokens`]: one-time email verification / password reset tokens
/// - [`middleware`]: bearer-token authentication into [`middleware::AuthContext`]
/// - [`authorization`]: owner / membership-role access rule for projects, tasks, comments
///
/// # Example
///
/// ```no_run
/// use projexy_shared::auth::password::{hash_password, verify_password};
/// use projexy_shared::auth::tokens::generate_token;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("kanban2024")?;
/// assert!(verify_password("kanban2024", &hash)?);
///
/// let (verification_token, stored_digest) = generate_token();
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
