/// Password hashing with Argon2id
///
/// Parameters: 64 MB memory, 3 passes, 4 lanes, 32-byte output. Hashes are
/// stored in PHC string format, so verification reads the parameters back
/// from the hash itself.
///
/// # Example
///
/// ```
/// use projexy_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("kanban2024")?;
/// assert!(verify_password("kanban2024", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// The blocking hashing task panicked or was cancelled
    #[error("Password hashing task failed: {0}")]
    TaskFailed(String),
}

fn argon2_instance() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536) // 64 MB
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with Argon2id and a random 16-byte salt
///
/// # Returns
///
/// PHC string, e.g. `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    argon2_instance()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))
}

/// Verifies a password against a stored PHC hash
///
/// # Returns
///
/// `Ok(true)` on match, `Ok(false)` on mismatch
///
/// # Errors
///
/// `PasswordError::InvalidHash` if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// [`hash_password`] on the blocking thread pool
///
/// Argon2id with these parameters takes tens of milliseconds of CPU; request
/// handlers call this variant so the async workers stay free.
pub async fn hash_password_async(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// [`verify_password`] on the blocking thread pool
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// Minimum accepted password length (characters)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length (characters)
///
/// Bounds the hashing work an unauthenticated request can trigger.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validates password strength
///
/// Passwords must be 8 to 128 characters and contain at least one letter and
/// one digit.
///
/// # Example
///
/// ```
/// use projexy_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("kanban2024").is_ok());
/// assert!(validate_password_strength("short1").is_err());
/// assert!(validate_password_strength("nodigitshere").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_parameters() {
        let hash = hash_password("kanban2024").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=65536,t=3,p=4"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("kanban2024").unwrap();
        let second = hash_password("kanban2024").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("kanban2024").unwrap();

        assert!(verify_password("kanban2024", &hash).unwrap());
        assert!(!verify_password("kanban2025", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("kanban2024", "not-a-phc-string"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[tokio::test]
    async fn test_async_variants_agree_with_sync() {
        let hash = hash_password_async("unicode-密码-1".to_string()).await.unwrap();

        assert!(verify_password("unicode-密码-1", &hash).unwrap());
        assert!(verify_password_async("unicode-密码-1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_async("other".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_validate_password_strength_valid() {
        for password in ["kanban2024", "correct horse 9", "Pa55word", "密码密码密码密码1"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }
    }

    #[test]
    fn test_validate_password_strength_too_short() {
        let result = validate_password_strength("abc123");
        assert!(result.unwrap_err().contains("at least 8 characters"));
    }

    #[test]
    fn test_validate_password_strength_too_long() {
        let password = format!("a1{}", "x".repeat(MAX_PASSWORD_LENGTH));
        let result = validate_password_strength(&password);
        assert!(result.unwrap_err().contains("at most 128 characters"));
    }

    #[test]
    fn test_validate_password_strength_requires_letter_and_digit() {
        assert!(validate_password_strength("1234567890")
            .unwrap_err()
            .contains("letter"));
        assert!(validate_password_strength("onlyletters")
            .unwrap_err()
            .contains("digit"));
    }
}
