/// Publisher abstraction
///
/// A publisher delivers one [`RealtimeEvent`] to whoever listens on its
/// channel. Delivery is at-most-once: implementations make a single attempt
/// and report failure, they never retry.

use async_trait::async_trait;

use super::channel::RealtimeEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Publish timed out")]
    Timeout,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Delivers `event` once
    async fn publish(&self, event: &RealtimeEvent) -> Result<(), PublishError>;
}
