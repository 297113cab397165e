use serde::{Deserialize, Serialize};

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub theme: String,
}

/// Request payload for posting a message to a room
#[derive(Debug, Deserialize)]
pub struct MessageCreateRequest {
    pub message: String,
}

/// Response carrying the ID of a created resource
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Response carrying a message's reaction count
#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub count: i64,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub message: String,
}
