/// Redis transport for realtime events
///
/// [`RedisPublisher`] sends each event with `PUBLISH <channel> <json>`, so any
/// number of API instances (or other consumers) can observe it.
/// [`run_redis_bridge`] is the receiving half: it pattern-subscribes to
/// `private-*` and feeds every message into this instance's [`LocalHub`],
/// which serves the SSE streams.
///
/// ```text
/// handler ──Notifier──> PUBLISH private-project-{id}
///                              │
///                  ┌───────────┴───────────┐
///                  ▼                       ▼
///          bridge (instance A)     bridge (instance B)
///                  │                       │
///              LocalHub                LocalHub ──> SSE clients
/// ```
///
/// # Example
///
/// ```no_run
/// use projexy_shared::realtime::redis::{RedisConfig, RedisPublisher};
///
/// # async fn example() -> anyhow::Result<()> {
/// let publisher = RedisPublisher::new(RedisConfig::new("redis://localhost:6379")).await?;
/// assert!(publisher.ping().await?);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::time::Duration;

use super::channel::RealtimeEvent;
use super::hub::LocalHub;
use super::publisher::{EventPublisher, PublishError};

/// Pattern matching every realtime channel
pub const CHANNEL_PATTERN: &str = "private-*";

#[derive(Debug, thiserror::Error)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => RedisClientError::ConnectionError(err.to_string()),
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Upper bound for a single PUBLISH or PING
    pub command_timeout: Duration,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct RedisPublisher {
    client: Client,
    manager: ConnectionManager,
    config: RedisConfig,
}

impl RedisPublisher {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis realtime publisher connected");

        Ok(Self {
            client,
            manager,
            config,
        })
    }

    /// Health check: `true` when Redis answers PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let reply: String = tokio::time::timeout(
            self.config.command_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::CommandError("PING timed out".to_string()))??;

        Ok(reply == "PONG")
    }

    /// Underlying client, for opening dedicated pub/sub connections
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, event: &RealtimeEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.manager.clone();

        let receivers: i64 = tokio::time::timeout(
            self.config.command_timeout,
            redis::cmd("PUBLISH")
                .arg(event.channel.name())
                .arg(payload)
                .query_async(&mut conn),
        )
        .await
        .map_err(|_| PublishError::Timeout)?
        .map_err(|e| PublishError::Transport(e.to_string()))?;

        tracing::trace!(channel = %event.channel, receivers, "Realtime event published to Redis");
        Ok(())
    }
}

/// Forwards every Redis realtime message into `hub` until the connection drops
///
/// Messages that aren't valid event envelopes are logged and skipped.
///
/// # Errors
///
/// Returns an error if the subscription cannot be established; once
/// subscribed, returns `Ok(())` when the server closes the stream.
pub async fn run_redis_bridge(client: Client, hub: LocalHub) -> Result<(), RedisClientError> {
    let mut pubsub = client.get_async_connection().await?.into_pubsub();
    pubsub.psubscribe(CHANNEL_PATTERN).await?;

    tracing::info!(pattern = CHANNEL_PATTERN, "Redis realtime bridge subscribed");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable realtime payload");
                continue;
            }
        };

        match serde_json::from_str::<RealtimeEvent>(&payload) {
            Ok(event) => {
                hub.send(event).await;
            }
            Err(e) => {
                tracing::warn!(
                    channel = msg.get_channel_name(),
                    error = %e,
                    "Ignoring malformed realtime event"
                );
            }
        }
    }

    tracing::warn!("Redis realtime bridge stream ended");
    Ok(())
}

/// Replaces credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.find('@'), url.find("://")) {
        return format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
    }
    url.to_string()
}
