/// Realtime endpoints
///
/// # Endpoints
///
/// - `POST /v1/realtime/auth` - Sign a private-channel subscription for a socket
/// - `GET /v1/realtime/stream?channel=...` - Server-sent events for one channel
///
/// Both apply the same rule: a user channel is open to that user only, a
/// project channel to the project's owner and members.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Form, Json,
};
use futures::Stream;
use projexy_shared::{
    auth::middleware::AuthContext,
    realtime::{
        channel_auth::{may_subscribe, ChannelAuth},
        Channel, RealtimeEvent,
    },
};
use serde::Deserialize;
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Subscription request, as posted by the realtime client library
#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub channel: String,
}

/// Parses `name` and checks that `user_id` may listen on it
async fn authorized_channel(state: &AppState, user_id: Uuid, name: &str) -> ApiResult<Channel> {
    let channel: Channel = name
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown channel: {}", name)))?;

    if !may_subscribe(&state.db, user_id, &channel).await? {
        tracing::debug!(user_id = %user_id, channel = %channel, "Channel subscription refused");
        return Err(ApiError::Forbidden(
            "Not authorized to subscribe to this channel".to_string(),
        ));
    }

    Ok(channel)
}

/// Sign a private-channel subscription
///
/// ```text
/// POST /v1/realtime/auth
/// Content-Type: application/x-www-form-urlencoded
///
/// socket_id=1234.5678&channel_name=private-project-<uuid>
/// ```
///
/// Returns `{ "auth": "<app_key>:<hex signature>" }`.
pub async fn authorize_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Form(req): Form<ChannelAuthRequest>,
) -> ApiResult<Json<ChannelAuth>> {
    let channel = authorized_channel(&state, auth.user_id, &req.channel_name).await?;
    let signed = state.channel_auth.sign(&req.socket_id, &channel)?;

    Ok(Json(signed))
}

/// Stream a channel's events as server-sent events
///
/// Each event's SSE name is the realtime event name (`new-comment`,
/// `new-task`) and its data is the JSON payload. Subscribers that fall behind
/// skip the events they missed. The stream ends when the server shuts down.
pub async fn stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let channel = authorized_channel(&state, auth.user_id, &query.channel).await?;
    let receiver = state.hub.subscribe(channel).await;

    tracing::debug!(user_id = %auth.user_id, channel = %channel, "SSE subscriber attached");

    let events = event_stream(receiver, state.shutdown.clone());

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

fn event_stream(
    receiver: broadcast::Receiver<RealtimeEvent>,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let events = BroadcastStream::new(receiver).filter_map(|received| match received {
        Ok(event) => to_sse_event(&event).map(Ok),
        Err(lagged) => {
            tracing::warn!(error = %lagged, "SSE subscriber lagged");
            None
        }
    });

    futures::StreamExt::take_until(events, shutdown.cancelled_owned())
}

fn to_sse_event(event: &RealtimeEvent) -> Option<Event> {
    match Event::default().event(event.event.as_str()).json_data(&event.data) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!(error = %e, event = %event.event, "Failed to encode realtime event");
            None
        }
    }
}
