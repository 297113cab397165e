use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::{
    models::{MessageModel, RoomModel},
    notifications::RoomNotification,
    repository::RoomRepository,
};
use crate::hub::Hub;
use crate::shared::AppError;

/// Service for room and message business logic.
///
/// Every successful write is followed by a detached publish to the room's
/// subscribers; the write never waits on delivery.
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    hub: Hub,
}

impl RoomService {
    pub fn new(repository: Arc<dyn RoomRepository + Send + Sync>, hub: Hub) -> Self {
        Self { repository, hub }
    }

    #[instrument(skip(self))]
    pub async fn create_room(&self, theme: String) -> Result<RoomModel, AppError> {
        let room = RoomModel::new(theme);
        self.repository.create_room(&room).await?;

        info!(room_id = %room.id, theme = %room.theme, "Room created");
        Ok(room)
    }

    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        self.repository.list_rooms().await
    }

    #[instrument(skip(self))]
    pub async fn create_message(
        &self,
        room_id: Uuid,
        text: String,
    ) -> Result<MessageModel, AppError> {
        self.require_room(room_id).await?;

        let message = MessageModel::new(room_id, text);
        self.repository.insert_message(&message).await?;

        info!(room_id = %room_id, message_id = %message.id, "Message created");

        self.notify(
            room_id,
            RoomNotification::MessageCreated {
                id: message.id,
                message: message.message.clone(),
            },
        );
        Ok(message)
    }

    #[instrument(skip(self))]
    pub async fn get_room_messages(&self, room_id: Uuid) -> Result<Vec<MessageModel>, AppError> {
        self.require_room(room_id).await?;
        self.repository.get_room_messages(room_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<MessageModel, AppError> {
        self.repository
            .get_message(room_id, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))
    }

    #[instrument(skip(self))]
    pub async fn react_to_message(&self, room_id: Uuid, message_id: Uuid) -> Result<i64, AppError> {
        let count = self
            .repository
            .react_to_message(room_id, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;

        self.notify(
            room_id,
            RoomNotification::MessageReactionIncreased {
                id: message_id,
                count,
            },
        );
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn remove_reaction(&self, room_id: Uuid, message_id: Uuid) -> Result<i64, AppError> {
        let count = self
            .repository
            .remove_reaction(room_id, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;

        self.notify(
            room_id,
            RoomNotification::MessageReactionDecreased {
                id: message_id,
                count,
            },
        );
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn mark_message_answered(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<MessageModel, AppError> {
        let message = self
            .repository
            .mark_message_answered(room_id, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;

        self.notify(
            room_id,
            RoomNotification::MessageAnswered {
                id: message.id,
                message: message.message.clone(),
            },
        );
        Ok(message)
    }

    async fn require_room(&self, room_id: Uuid) -> Result<(), AppError> {
        if self.repository.room_exists(room_id).await? {
            Ok(())
        } else {
            debug!(room_id = %room_id, "Room not found");
            Err(AppError::NotFound("Room not found".to_string()))
        }
    }

    fn notify(&self, room_id: Uuid, notification: RoomNotification) {
        match notification.to_payload() {
            Ok(payload) => {
                debug!(room_id = %room_id, kind = notification.kind(), "Publishing notification");
                let _ = self.hub.spawn_publish(room_id, payload);
            }
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to serialise notification");
            }
        }
    }
}

fn message_not_found(message_id: Uuid) -> AppError {
    AppError::NotFound(format!("Message {} not found", message_id))
}
