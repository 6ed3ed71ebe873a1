/// Realtime notifications
///
/// State changes are pushed to per-project and per-user private channels.
/// Delivery is best-effort and at-most-once; the REST API stays the source
/// of truth.
///
/// # Modules
///
/// - [`channel`]: channel names and the event envelope
/// - [`publisher`]: the [`EventPublisher`] trait
/// - [`hub`]: in-process broadcast hub feeding SSE subscribers
/// - [`redis`]: Redis PUBLISH transport and the Redis → hub bridge
/// - [`notifier`]: fan-out of domain events to all publishers
/// - [`channel_auth`]: subscription signatures and the subscribe rule

pub mod channel;
pub mod channel_auth;
pub mod hub;
pub mod notifier;
pub mod publisher;
pub mod redis;

pub use channel::{Channel, RealtimeEvent};
pub use hub::LocalHub;
pub use notifier::Notifier;
pub use publisher::{EventPublisher, PublishError};
