use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for rooms table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub id: Uuid,
    pub theme: String,
    pub created_at: DateTime<Utc>,
}

impl RoomModel {
    /// Creates a new room model with a generated ID
    pub fn new(theme: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            theme,
            created_at: Utc::now(),
        }
    }
}

/// Database model for messages table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct MessageModel {
    pub id: Uuid,
    pub room_id: Uuid,
    pub message: String,
    pub reaction_count: i64,
    pub answered: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageModel {
    pub fn new(room_id: Uuid, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            message,
            reaction_count: 0,
            answered: false,
            created_at: Utc::now(),
        }
    }
}
