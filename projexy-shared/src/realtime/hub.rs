/// In-process fan-out hub
///
/// One `tokio::sync::broadcast` channel per realtime channel name, created on
/// first subscription and dropped once the last subscriber goes away. The SSE
/// endpoint subscribes here; publishing to a channel nobody listens to is a
/// no-op.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::channel::{Channel, RealtimeEvent};
use super::publisher::{EventPublisher, PublishError};

/// Per-channel buffer; slow subscribers that fall further behind skip events
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct LocalHub {
    channels: Arc<RwLock<HashMap<Channel, broadcast::Sender<RealtimeEvent>>>>,
    capacity: usize,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to one channel
    pub async fn subscribe(&self, channel: Channel) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.write().await;

        channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `event` to current subscribers of its channel
    ///
    /// # Returns
    ///
    /// Number of subscribers that received the event
    pub async fn send(&self, event: RealtimeEvent) -> usize {
        let channel = event.channel;

        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&channel) {
                Some(sender) => sender.send(event).unwrap_or(0),
                None => return 0,
            }
        };

        if delivered == 0 {
            self.prune(channel).await;
        }

        delivered
    }

    /// Number of live subscribers on a channel
    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels
            .read()
            .await
            .get(&channel)
            .map_or(0, |sender| sender.receiver_count())
    }

    async fn prune(&self, channel: Channel) {
        let mut channels = self.channels.write().await;
        if channels.get(&channel).is_some_and(|s| s.receiver_count() == 0) {
            channels.remove(&channel);
        }
    }
}

#[async_trait]
impl EventPublisher for LocalHub {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn publish(&self, event: &RealtimeEvent) -> Result<(), PublishError> {
        let channel = event.channel;
        let delivered = self.send(event.clone()).await;
        tracing::trace!(channel = %channel, delivered, "Local realtime event sent");
        Ok(())
    }
}
