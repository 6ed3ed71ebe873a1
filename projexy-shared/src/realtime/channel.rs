/// Channel naming and event envelopes
///
/// Two private channel families exist:
///
/// - `private-project-{project_id}`: every member of a project
/// - `private-user-{user_id}`: a single user
///
/// Events are JSON envelopes `{ "channel", "event", "data" }`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const PROJECT_PREFIX: &str = "private-project-";
const USER_PREFIX: &str = "private-user-";

/// Event name for a new comment, sent on the project channel
pub const EVENT_NEW_COMMENT: &str = "new-comment";

/// Event name for a task assignment, sent on the assignee's user channel
pub const EVENT_NEW_TASK: &str = "new-task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Project(Uuid),
    User(Uuid),
}

impl Channel {
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Project(id) => write!(f, "{}{}", PROJECT_PREFIX, id),
            Channel::User(id) => write!(f, "{}{}", USER_PREFIX, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown channel: {0}")]
pub struct InvalidChannel(pub String);

impl FromStr for Channel {
    type Err = InvalidChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |id: &str| Uuid::parse_str(id).map_err(|_| InvalidChannel(s.to_string()));

        if let Some(id) = s.strip_prefix(PROJECT_PREFIX) {
            Ok(Channel::Project(parse(id)?))
        } else if let Some(id) = s.strip_prefix(USER_PREFIX) {
            Ok(Channel::User(parse(id)?))
        } else {
            Err(InvalidChannel(s.to_string()))
        }
    }
}

impl Serialize for Channel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One event on one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub channel: Channel,
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(channel: Channel, event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            channel,
            event: event.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        let id = Uuid::parse_str("7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11").unwrap();

        assert_eq!(
            Channel::Project(id).name(),
            "private-project-7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11"
        );
        assert_eq!(
            Channel::User(id).name(),
            "private-user-7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11"
        );
    }

    #[test]
    fn test_channel_parse() {
        let id = Uuid::new_v4();

        assert_eq!(Channel::Project(id).name().parse::<Channel>().unwrap(), Channel::Project(id));
        assert_eq!(Channel::User(id).name().parse::<Channel>().unwrap(), Channel::User(id));
    }

    #[test]
    fn test_channel_parse_rejects_unknown() {
        assert!("presence-project-1".parse::<Channel>().is_err());
        assert!("private-project-not-a-uuid".parse::<Channel>().is_err());
        assert!("private-team-7f1c9a52-1d1e-4a53-9a39-5d2b0f5d8e11".parse::<Channel>().is_err());
    }

    #[test]
    fn test_event_envelope_json() {
        let id = Uuid::new_v4();
        let event = RealtimeEvent::new(
            Channel::User(id),
            EVENT_NEW_TASK,
            serde_json::json!({ "message": "hi" }),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], format!("private-user-{}", id));
        assert_eq!(json["event"], "new-task");

        let back: RealtimeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
