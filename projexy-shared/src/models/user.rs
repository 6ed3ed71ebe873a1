/// User model and database operations
///
/// Users own projects, join other projects through memberships, and carry the
/// subscription plan that gates premium features.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE plan AS ENUM ('FREE', 'PREMIUM');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     email_verified_at TIMESTAMPTZ,
///     verification_token_hash VARCHAR(64),
///     reset_token_hash VARCHAR(64),
///     reset_token_expires_at TIMESTAMPTZ,
///     image_url TEXT,
///     plan plan NOT NULL DEFAULT 'FREE',
///     stripe_customer_id VARCHAR(255) UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// One-time tokens (email verification, password reset) are stored only as
/// SHA-256 hex digests; see [`crate::auth::tokens`].
///
/// # Example
///
/// ```no_run
/// use projexy_shared::models::user::{User, CreateUser};
/// use projexy_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Ada Lovelace".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     verification_token_hash: None,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, email_verified_at, \
    verification_token_hash, reset_token_hash, reset_token_expires_at, image_url, \
    plan, stripe_customer_id, created_at, updated_at, last_login_at";

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// Default plan: limited project count, no collaboration features
    #[default]
    Free,

    /// Paid plan: unlimited projects, all features
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Premium => "PREMIUM",
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, Plan::Premium)
    }
}

/// User account
///
/// Secrets (password hash, token digests) are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Set once the verification link has been followed
    pub email_verified_at: Option<DateTime<Utc>>,

    /// Digest of the outstanding verification token
    #[serde(skip_serializing, default)]
    pub verification_token_hash: Option<String>,

    /// Digest of the outstanding password-reset token
    #[serde(skip_serializing, default)]
    pub reset_token_hash: Option<String>,

    /// When the reset token stops being accepted
    #[serde(skip_serializing, default)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    /// Profile picture URL
    pub image_url: Option<String>,

    /// Current subscription plan
    pub plan: Plan,

    /// Customer id at the payment processor
    #[serde(skip_serializing, default)]
    pub stripe_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Public projection of a user, as embedded in member lists, assignees and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image_url: Option<String>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,

    /// Email address (lowercased on insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Digest of the verification token mailed to the user
    pub verification_token_hash: Option<String>,
}

impl User {
    /// Whether the user has completed email verification
    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image_url: self.image_url.clone(),
        }
    }

    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint violation)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, verification_token_hash)
            VALUES ($1, LOWER($2), $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.name)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.verification_token_hash)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use projexy_shared::models::user::User;
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// if let Some(user) = User::find_by_email(&pool, "user@example.com").await? {
    ///     println!("Found user: {}", user.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Completes email verification for the holder of `token_hash`
    ///
    /// Marks the account verified and clears the token in a single statement,
    /// so a token can be redeemed at most once.
    ///
    /// # Returns
    ///
    /// The verified user, or `None` if no account holds this token (never
    /// issued, or already redeemed)
    pub async fn verify_email(pool: &PgPool, token_hash: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET email_verified_at = NOW(),
                verification_token_hash = NULL,
                updated_at = NOW()
            WHERE verification_token_hash = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Stores a password-reset token digest and its expiry
    pub async fn set_reset_token(
        pool: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2,
                reset_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the password of the holder of an unexpired reset token
    ///
    /// The token and its expiry are cleared in the same statement.
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if the token is unknown, already used, or expired
    pub async fn reset_password(
        pool: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_token_hash = $1
              AND reset_token_expires_at > NOW()
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .bind(new_password_hash)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets or clears the profile picture URL
    pub async fn update_image(
        pool: &PgPool,
        id: Uuid,
        image_url: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET image_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(image_url)
            .fetch_optional(pool)
            .await
    }

    /// Links the user to a customer record at the payment processor
    pub async fn set_billing_customer(
        pool: &PgPool,
        id: Uuid,
        customer_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET stripe_customer_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(customer_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the plan of whichever user is linked to `customer_id`
    ///
    /// # Returns
    ///
    /// Number of users updated (0 when no account is linked to the customer)
    pub async fn set_plan_by_billing_customer(
        pool: &PgPool,
        customer_id: &str,
        plan: Plan,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET plan = $2, updated_at = NOW() WHERE stripe_customer_id = $1",
        )
        .bind(customer_id)
        .bind(plan)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Updates the last login timestamp for a user
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            email_verified_at: None,
            verification_token_hash: Some("a".repeat(64)),
            reset_token_hash: None,
            reset_token_expires_at: None,
            image_url: None,
            plan: Plan::Free,
            stripe_customer_id: Some("cus_123".to_string()),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_plan_default_is_free() {
        assert_eq!(Plan::default(), Plan::Free);
        assert!(!Plan::Free.is_premium());
        assert!(Plan::Premium.is_premium());
    }

    #[test]
    fn test_plan_serde_matches_database_labels() {
        assert_eq!(serde_json::to_string(&Plan::Premium).unwrap(), "\"PREMIUM\"");
        assert_eq!(Plan::Free.as_str(), "FREE");
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let json = serde_json::to_value(sample_user()).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("verification_token_hash").is_none());
        assert!(json.get("stripe_customer_id").is_none());
        assert_eq!(json["plan"], "FREE");
    }

    #[test]
    fn test_email_verified_flag() {
        let mut user = sample_user();
        assert!(!user.is_email_verified());

        user.email_verified_at = Some(Utc::now());
        assert!(user.is_email_verified());
    }
}
