/// Payment processor webhook
///
/// `POST /v1/webhooks/stripe` receives subscription lifecycle events and moves
/// the matching user between FREE and PREMIUM. The body must be read raw: the
/// signature covers the exact bytes sent.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use projexy_shared::billing::{self, SIGNATURE_HEADER};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Verify and apply a subscription event
///
/// # Errors
///
/// - `400 Bad Request`: missing/invalid signature, stale timestamp, bad JSON,
///   or no webhook secret configured
/// - `500 Internal Server Error`: the plan update failed; the processor retries
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let applied = billing::handle_webhook(
        &state.db,
        state.config.billing.webhook_secret.as_deref(),
        signature,
        &body,
    )
    .await?;

    if let Some(event) = applied {
        tracing::info!(
            event_type = %event.event_type,
            plan = event.plan.as_str(),
            "Subscription webhook applied"
        );
    }

    Ok(Json(WebhookAck { received: true }))
}
