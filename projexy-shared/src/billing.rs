/// Payment-processor webhook handling
///
/// The processor reports subscription lifecycle changes by POSTing signed
/// events. Only three event types matter; they move every user linked to the
/// event's customer id between plans:
///
/// | Event | New plan |
/// |-------|----------|
/// | `customer.subscription.created` | PREMIUM |
/// | `customer.subscription.updated` | PREMIUM |
/// | `customer.subscription.deleted` | FREE |
///
/// Everything else is acknowledged and ignored.
///
/// # Signature
///
/// The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>[,v1=<hex>]`.
/// A signature is valid when one `v1` entry equals
/// `hex(HMAC-SHA256(secret, "{t}.{raw body}"))` and `t` is within the
/// tolerance of the current time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;

use crate::auth::tokens::constant_time_eq;
use crate::models::user::{Plan, User};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed event, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Malformed signature header")]
    MalformedSignature,

    #[error("No matching signature")]
    SignatureMismatch,

    #[error("Timestamp outside the tolerance window")]
    StaleTimestamp,

    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl WebhookError {
    /// Whether the processor should retry delivery
    ///
    /// Signature and payload problems will fail again, a database error may not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::DatabaseError(_))
    }
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedSignature)?,
                );
            }
            Some(("v1", value)) => signatures.push(value),
            Some(_) => {}
            None => return Err(WebhookError::MalformedSignature),
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader { timestamp, signatures }),
        _ => Err(WebhookError::MalformedSignature),
    }
}

/// Hex HMAC for a timestamp and raw body
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks the signature header against the raw request body
///
/// # Errors
///
/// - `WebhookError::MalformedSignature` if the header can't be parsed
/// - `WebhookError::StaleTimestamp` if `t` is more than `tolerance_secs` away from `now`
/// - `WebhookError::SignatureMismatch` if no `v1` entry matches
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let parsed = parse_header(header)?;

    if now.timestamp().abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = compute_signature(secret, parsed.timestamp, payload);

    if parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(expected.as_bytes(), candidate.as_bytes()))
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// A subscription change the service acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEvent {
    pub event_type: String,
    pub customer_id: String,
    pub plan: Plan,
}

impl SubscriptionEvent {
    /// Extracts the plan change from an event body
    ///
    /// # Returns
    ///
    /// `None` for event types that don't change plans or that carry no customer
    pub fn parse(payload: &[u8]) -> Result<Option<Self>, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(payload)?;

        let plan = match raw.event_type.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" => Plan::Premium,
            "customer.subscription.deleted" => Plan::Free,
            _ => return Ok(None),
        };

        // Either a bare id or the expanded customer object
        let customer_id = match raw.data.object.get("customer") {
            Some(serde_json::Value::String(id)) => Some(id.clone()),
            Some(serde_json::Value::Object(customer)) => customer
                .get("id")
                .and_then(|id| id.as_str())
                .map(str::to_string),
            _ => None,
        };

        Ok(customer_id.map(|customer_id| SubscriptionEvent {
            event_type: raw.event_type,
            customer_id,
            plan,
        }))
    }

    /// Writes the plan to every user linked to the customer
    ///
    /// # Returns
    ///
    /// Number of users updated
    pub async fn apply(&self, pool: &PgPool) -> Result<u64, WebhookError> {
        let updated = User::set_plan_by_billing_customer(pool, &self.customer_id, self.plan).await?;

        tracing::info!(
            event_type = %self.event_type,
            customer_id = %self.customer_id,
            plan = self.plan.as_str(),
            users_updated = updated,
            "Applied subscription event"
        );

        Ok(updated)
    }
}

/// Verifies and applies one webhook delivery
///
/// # Returns
///
/// The applied event, or `None` if it was acknowledged without effect
pub async fn handle_webhook(
    pool: &PgPool,
    secret: Option<&str>,
    signature_header: Option<&str>,
    payload: &[u8],
) -> Result<Option<SubscriptionEvent>, WebhookError> {
    let secret = secret.ok_or(WebhookError::NotConfigured)?;
    let header = signature_header.ok_or(WebhookError::MissingSignature)?;

    verify_signature(payload, header, secret, Utc::now(), SIGNATURE_TOLERANCE_SECS)?;

    match SubscriptionEvent::parse(payload)? {
        Some(event) => {
            event.apply(pool).await?;
            Ok(Some(event))
        }
        None => {
            tracing::debug!("Ignoring webhook event without plan change");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "whsec_test_secret";

    fn signed_header(payload: &[u8], at: DateTime<Utc>) -> String {
        format!(
            "t={},v1={}",
            at.timestamp(),
            compute_signature(SECRET, at.timestamp(), payload)
        )
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"customer.subscription.created"}"#;
        let now = Utc::now();
        let header = signed_header(payload, now);

        assert!(verify_signature(payload, &header, SECRET, now, SIGNATURE_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_signature_among_several() {
        let payload = b"{}";
        let now = Utc::now();
        let header = format!(
            "t={},v1={},v0=legacy,v1={}",
            now.timestamp(),
            "00".repeat(32),
            compute_signature(SECRET, now.timestamp(), payload)
        );

        assert!(verify_signature(payload, &header, SECRET, now, SIGNATURE_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let now = Utc::now();
        let header = signed_header(b"{\"a\":1}", now);

        assert!(matches!(
            verify_signature(b"{\"a\":2}", &header, SECRET, now, SIGNATURE_TOLERANCE_SECS),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let now = Utc::now();
        let header = signed_header(b"{}", now);

        assert!(matches!(
            verify_signature(b"{}", &header, "whsec_other", now, SIGNATURE_TOLERANCE_SECS),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let now = Utc::now();
        let header = signed_header(b"{}", now - Duration::seconds(SIGNATURE_TOLERANCE_SECS + 1));

        assert!(matches!(
            verify_signature(b"{}", &header, SECRET, now, SIGNATURE_TOLERANCE_SECS),
            Err(WebhookError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let now = Utc::now();
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!(
                "t={},v1={}",
                timestamp,
                compute_signature(SECRET, timestamp, b"{}")
            );

            assert!(
                matches!(
                    verify_signature(b"{}", &header, SECRET, now, SIGNATURE_TOLERANCE_SECS),
                    Err(WebhookError::StaleTimestamp)
                ),
                "t={} should be stale",
                timestamp
            );
        }
    }

    #[test]
    fn test_malformed_headers() {
        let now = Utc::now();
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", "t=123"] {
            assert!(
                matches!(
                    verify_signature(b"{}", header, SECRET, now, SIGNATURE_TOLERANCE_SECS),
                    Err(WebhookError::MalformedSignature)
                ),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_parse_plan_mapping() {
        let created = br#"{"type":"customer.subscription.created","data":{"object":{"customer":"cus_1"}}}"#;
        let updated = br#"{"type":"customer.subscription.updated","data":{"object":{"customer":"cus_1"}}}"#;
        let deleted = br#"{"type":"customer.subscription.deleted","data":{"object":{"customer":"cus_1"}}}"#;

        assert_eq!(SubscriptionEvent::parse(created).unwrap().unwrap().plan, Plan::Premium);
        assert_eq!(SubscriptionEvent::parse(updated).unwrap().unwrap().plan, Plan::Premium);
        assert_eq!(SubscriptionEvent::parse(deleted).unwrap().unwrap().plan, Plan::Free);
    }

    #[test]
    fn test_parse_expanded_customer() {
        let payload = br#"{"type":"customer.subscription.updated","data":{"object":{"customer":{"id":"cus_42","email":"a@b.c"}}}}"#;
        let event = SubscriptionEvent::parse(payload).unwrap().unwrap();
        assert_eq!(event.customer_id, "cus_42");
    }

    #[test]
    fn test_parse_ignores_other_events() {
        let payload = br#"{"type":"invoice.paid","data":{"object":{"customer":"cus_1"}}}"#;
        assert!(SubscriptionEvent::parse(payload).unwrap().is_none());

        let no_customer = br#"{"type":"customer.subscription.deleted","data":{"object":{}}}"#;
        assert!(SubscriptionEvent::parse(no_customer).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            SubscriptionEvent::parse(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(WebhookError::DatabaseError(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!WebhookError::SignatureMismatch.is_retryable());
    }
}
