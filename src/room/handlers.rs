use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    models::{MessageModel, RoomModel},
    types::{AckResponse, CreatedResponse, MessageCreateRequest, ReactionResponse, RoomCreateRequest},
};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /api/rooms
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let room = state.room_service().create_room(request.theme).await?;

    Ok(Json(CreatedResponse {
        id: room.id.to_string(),
    }))
}

/// HTTP handler for listing all rooms
///
/// GET /api/rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomModel>>, AppError> {
    let rooms = state.room_service().list_rooms().await?;

    info!(room_count = rooms.len(), "Rooms listed successfully");
    Ok(Json(rooms))
}

/// POST /api/rooms/:room_id/messages
#[instrument(name = "create_message", skip(state, request))]
pub async fn create_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<MessageCreateRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let message = state
        .room_service()
        .create_message(room_id, request.message)
        .await?;

    Ok(Json(CreatedResponse {
        id: message.id.to_string(),
    }))
}

/// GET /api/rooms/:room_id/messages
#[instrument(name = "get_room_messages", skip(state))]
pub async fn get_room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<MessageModel>>, AppError> {
    let messages = state.room_service().get_room_messages(room_id).await?;
    Ok(Json(messages))
}

/// GET /api/rooms/:room_id/messages/:message_id
#[instrument(name = "get_room_message", skip(state))]
pub async fn get_room_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageModel>, AppError> {
    let message = state
        .room_service()
        .get_message(room_id, message_id)
        .await?;
    Ok(Json(message))
}

/// PATCH /api/rooms/:room_id/messages/:message_id/react
#[instrument(name = "react_to_message", skip(state))]
pub async fn react_to_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReactionResponse>, AppError> {
    let count = state
        .room_service()
        .react_to_message(room_id, message_id)
        .await?;
    Ok(Json(ReactionResponse { count }))
}

/// DELETE /api/rooms/:room_id/messages/:message_id/react
#[instrument(name = "remove_reaction", skip(state))]
pub async fn remove_reaction(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReactionResponse>, AppError> {
    let count = state
        .room_service()
        .remove_reaction(room_id, message_id)
        .await?;
    Ok(Json(ReactionResponse { count }))
}

/// PATCH /api/rooms/:room_id/messages/:message_id/answer
#[instrument(name = "mark_message_answered", skip(state))]
pub async fn mark_message_answered(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AckResponse>, AppError> {
    state
        .room_service()
        .mark_message_answered(room_id, message_id)
        .await?;

    Ok(Json(AckResponse {
        message: "Message marked as answered".to_string(),
    }))
}
