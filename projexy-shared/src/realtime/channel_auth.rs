/// Private-channel authorization
///
/// Before a client may subscribe to a private channel it asks the API to
/// sign `(socket_id, channel)`. The signature format is the one used by
/// Pusher-compatible brokers:
///
/// ```text
/// auth = "{app_key}:{hex(HMAC-SHA256(app_secret, "{socket_id}:{channel}"))}"
/// ```
///
/// The API only signs when the caller may listen: a user channel only for
/// that user, a project channel for any project member.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use super::channel::Channel;
use crate::auth::authorization::{can_access, Resource};
use crate::auth::tokens::constant_time_eq;
use crate::models::membership::ProjectRole;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelAuthError {
    #[error("Invalid socket id")]
    InvalidSocketId,

    #[error("Invalid signing key")]
    InvalidKey,
}

/// Body returned to the subscribing client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelAuth {
    pub auth: String,
}

#[derive(Clone)]
pub struct ChannelAuthorizer {
    app_key: String,
    app_secret: String,
}

impl std::fmt::Debug for ChannelAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelAuthorizer")
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

impl ChannelAuthorizer {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Signs a subscription of `socket_id` to `channel`
    pub fn sign(&self, socket_id: &str, channel: &Channel) -> Result<ChannelAuth, ChannelAuthError> {
        if !is_valid_socket_id(socket_id) {
            return Err(ChannelAuthError::InvalidSocketId);
        }

        let signature = self.signature(&format!("{}:{}", socket_id, channel))?;

        Ok(ChannelAuth {
            auth: format!("{}:{}", self.app_key, signature),
        })
    }

    /// Checks a signature produced by [`sign`](Self::sign)
    pub fn verify(&self, socket_id: &str, channel: &Channel, auth: &str) -> bool {
        match self.sign(socket_id, channel) {
            Ok(expected) => constant_time_eq(expected.auth.as_bytes(), auth.as_bytes()),
            Err(_) => false,
        }
    }

    fn signature(&self, message: &str) -> Result<String, ChannelAuthError> {
        let mut mac = HmacSha256::new_from_slice(self.app_secret.as_bytes())
            .map_err(|_| ChannelAuthError::InvalidKey)?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Socket ids look like `123.456`
pub fn is_valid_socket_id(socket_id: &str) -> bool {
    match socket_id.split_once('.') {
        Some((a, b)) => {
            !a.is_empty()
                && !b.is_empty()
                && a.bytes().all(|c| c.is_ascii_digit())
                && b.bytes().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Whether `user_id` may listen on `channel`
pub async fn may_subscribe(pool: &PgPool, user_id: Uuid, channel: &Channel) -> Result<bool, sqlx::Error> {
    match *channel {
        Channel::User(owner) => Ok(owner == user_id),
        Channel::Project(project_id) => {
            can_access(pool, user_id, Resource::Project(project_id), ProjectRole::Member).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_reference_hmac() {
        let authorizer = ChannelAuthorizer::new("app-key", "app-secret");
        let channel: Channel = "private-user-7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11"
            .parse()
            .unwrap();

        let auth = authorizer.sign("1234.5678", &channel).unwrap().auth;

        let mut mac = HmacSha256::new_from_slice(b"app-secret").unwrap();
        mac.update(b"1234.5678:private-user-7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11");
        let expected = format!("app-key:{}", hex::encode(mac.finalize().into_bytes()));

        assert_eq!(auth, expected);
    }

    #[test]
    fn test_verify() {
        let authorizer = ChannelAuthorizer::new("key", "secret");
        let channel = Channel::Project(Uuid::new_v4());
        let auth = authorizer.sign("1.2", &channel).unwrap().auth;

        assert!(authorizer.verify("1.2", &channel, &auth));
        assert!(!authorizer.verify("1.3", &channel, &auth));
        assert!(!authorizer.verify("1.2", &Channel::Project(Uuid::new_v4()), &auth));
        assert!(!ChannelAuthorizer::new("key", "other").verify("1.2", &channel, &auth));
    }

    #[test]
    fn test_socket_id_validation() {
        assert!(is_valid_socket_id("123.456"));
        assert!(!is_valid_socket_id("123"));
        assert!(!is_valid_socket_id(".456"));
        assert!(!is_valid_socket_id("12a.456"));
        assert!(!is_valid_socket_id("1.2:private-user-x"));

        let authorizer = ChannelAuthorizer::new("key", "secret");
        assert!(matches!(
            authorizer.sign("bogus", &Channel::User(Uuid::new_v4())),
            Err(ChannelAuthError::InvalidSocketId)
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", ChannelAuthorizer::new("key", "top-secret"));
        assert!(!debug.contains("top-secret"));
    }
}
