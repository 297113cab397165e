use serde::Serialize;
use uuid::Uuid;

use crate::hub::Payload;

/// Notifications pushed to room subscribers after a write succeeded.
///
/// Serialised as `{"kind": "...", "value": {...}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoomNotification {
    MessageCreated { id: Uuid, message: String },
    MessageReactionIncreased { id: Uuid, count: i64 },
    MessageReactionDecreased { id: Uuid, count: i64 },
    MessageAnswered { id: Uuid, message: String },
}

impl RoomNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            RoomNotification::MessageCreated { .. } => "message_created",
            RoomNotification::MessageReactionIncreased { .. } => "message_reaction_increased",
            RoomNotification::MessageReactionDecreased { .. } => "message_reaction_decreased",
            RoomNotification::MessageAnswered { .. } => "message_answered",
        }
    }

    /// Serialises the notification once, ready to be shared by every delivery
    pub fn to_payload(&self) -> Result<Payload, serde_json::Error> {
        serde_json::to_string(self).map(Payload::from)
    }
}
