/// One-time tokens for email verification and password reset
///
/// A token is 32 random base62 characters handed to the user (inside an
/// emailed link). Only its SHA-256 hex digest is stored, so a database leak
/// does not expose redeemable tokens.
///
/// # Example
///
/// ```
/// use projexy_shared::auth::tokens::{generate_token, hash_token, verify_token};
///
/// let (token, digest) = generate_token();
/// assert_eq!(token.len(), 32);
/// assert_eq!(digest, hash_token(&token));
/// assert!(verify_token(&token, &digest));
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a one-time token (characters)
pub const TOKEN_LENGTH: usize = 32;

/// How long a password-reset token stays valid
pub fn reset_token_ttl() -> Duration {
    Duration::hours(1)
}

/// Expiry timestamp for a reset token issued now
pub fn reset_token_expiry() -> DateTime<Utc> {
    Utc::now() + reset_token_ttl()
}

/// Generates a token and its storage digest
///
/// # Returns
///
/// Tuple of (plaintext_token, sha256_hex)
pub fn generate_token() -> (String, String) {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    let token: String = (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let digest = hash_token(&token);

    (token, digest)
}

/// Hex-encoded SHA-256 of a token (64 characters)
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Whether `token` looks like something [`generate_token`] produced
///
/// Lets handlers reject garbage before touching the database.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Compares a presented token with a stored digest in constant time
pub fn verify_token(token: &str, stored_digest: &str) -> bool {
    constant_time_eq(hash_token(token).as_bytes(), stored_digest.as_bytes())
}

/// Byte-slice equality whose running time depends only on the lengths
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
