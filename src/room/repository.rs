use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{MessageModel, RoomModel};
use crate::hub::{HubError, TopicId, TopicStore};
use crate::shared::AppError;

/// Trait for room and message storage.
///
/// Every room store doubles as the hub's topic directory, so subscriptions
/// can be validated against it directly.
#[async_trait]
pub trait RoomRepository: TopicStore {
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError>;
    async fn get_room(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError>;
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError>;
    async fn room_exists(&self, room_id: Uuid) -> Result<bool, AppError>;

    async fn insert_message(&self, message: &MessageModel) -> Result<(), AppError>;
    async fn get_room_messages(&self, room_id: Uuid) -> Result<Vec<MessageModel>, AppError>;
    async fn get_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError>;

    /// Increments the reaction count, returning the new count
    async fn react_to_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError>;

    /// Decrements the reaction count without going below zero
    async fn remove_reaction(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError>;

    async fn mark_message_answered(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError>;
}

fn topic_lookup_error(e: AppError) -> HubError {
    HubError::Store(e.to_string())
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<Uuid, RoomModel>,
    // room_id -> messages in insertion order
    messages: HashMap<Uuid, Vec<MessageModel>>,
}

impl Tables {
    fn message_mut(&mut self, room_id: Uuid, message_id: Uuid) -> Option<&mut MessageModel> {
        self.messages
            .get_mut(&room_id)?
            .iter_mut()
            .find(|m| m.id == message_id)
    }
}

/// In-memory implementation of RoomRepository for development and testing
#[derive(Default)]
pub struct InMemoryRoomRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables.lock().map_err(|_| {
            warn!("In-memory room tables poisoned");
            AppError::Internal
        })
    }
}

#[async_trait]
impl TopicStore for InMemoryRoomRepository {
    async fn topic_exists(&self, topic: TopicId) -> Result<bool, HubError> {
        self.room_exists(topic).await.map_err(topic_lookup_error)
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.id, theme = %room.theme, "Creating room in memory");

        let mut tables = self.tables()?;
        if tables.rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room already exists in memory");
            return Err(AppError::DatabaseError("Room already exists".to_string()));
        }
        tables.rooms.insert(room.id, room.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError> {
        let room = self.tables()?.rooms.get(&room_id).cloned();
        if room.is_none() {
            debug!(room_id = %room_id, "Room not found in memory");
        }
        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let mut rooms: Vec<RoomModel> = self.tables()?.rooms.values().cloned().collect();
        rooms.sort_by_key(|r| r.created_at);
        Ok(rooms)
    }

    async fn room_exists(&self, room_id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables()?.rooms.contains_key(&room_id))
    }

    #[instrument(skip(self, message))]
    async fn insert_message(&self, message: &MessageModel) -> Result<(), AppError> {
        debug!(room_id = %message.room_id, message_id = %message.id, "Inserting message in memory");

        let mut tables = self.tables()?;
        if !tables.rooms.contains_key(&message.room_id) {
            return Err(AppError::NotFound("Room not found".to_string()));
        }
        tables
            .messages
            .entry(message.room_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room_messages(&self, room_id: Uuid) -> Result<Vec<MessageModel>, AppError> {
        Ok(self
            .tables()?
            .messages
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn get_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError> {
        Ok(self
            .tables()?
            .message_mut(room_id, message_id)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn react_to_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError> {
        let mut tables = self.tables()?;
        Ok(tables.message_mut(room_id, message_id).map(|m| {
            m.reaction_count += 1;
            m.reaction_count
        }))
    }

    #[instrument(skip(self))]
    async fn remove_reaction(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError> {
        let mut tables = self.tables()?;
        Ok(tables.message_mut(room_id, message_id).map(|m| {
            m.reaction_count = (m.reaction_count - 1).max(0);
            m.reaction_count
        }))
    }

    #[instrument(skip(self))]
    async fn mark_message_answered(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError> {
        let mut tables = self.tables()?;
        Ok(tables.message_mut(room_id, message_id).map(|m| {
            m.answered = true;
            m.clone()
        }))
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id UUID PRIMARY KEY,
        theme TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        room_id UUID NOT NULL REFERENCES rooms (id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        reaction_count BIGINT NOT NULL DEFAULT 0,
        answered BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the rooms and messages tables when they are missing
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(database_error)?;
        }
        Ok(())
    }
}

fn database_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Database query failed");
    AppError::DatabaseError(e.to_string())
}

#[async_trait]
impl TopicStore for PostgresRoomRepository {
    async fn topic_exists(&self, topic: TopicId) -> Result<bool, HubError> {
        self.room_exists(topic).await.map_err(topic_lookup_error)
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.id, theme = %room.theme, "Creating room in database");

        sqlx::query("INSERT INTO rooms (id, theme, created_at) VALUES ($1, $2, $3)")
            .bind(room.id)
            .bind(&room.theme)
            .bind(room.created_at)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>("SELECT id, theme, created_at FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>("SELECT id, theme, created_at FROM rooms ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }

    async fn room_exists(&self, room_id: Uuid) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM rooms WHERE id = $1)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, message))]
    async fn insert_message(&self, message: &MessageModel) -> Result<(), AppError> {
        debug!(room_id = %message.room_id, message_id = %message.id, "Inserting message in database");

        sqlx::query(
            "INSERT INTO messages (id, room_id, message, reaction_count, answered, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.room_id)
        .bind(&message.message)
        .bind(message.reaction_count)
        .bind(message.answered)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room_messages(&self, room_id: Uuid) -> Result<Vec<MessageModel>, AppError> {
        sqlx::query_as::<_, MessageModel>(
            "SELECT id, room_id, message, reaction_count, answered, created_at \
             FROM messages WHERE room_id = $1 ORDER BY created_at",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn get_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError> {
        sqlx::query_as::<_, MessageModel>(
            "SELECT id, room_id, message, reaction_count, answered, created_at \
             FROM messages WHERE room_id = $1 AND id = $2",
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn react_to_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE messages SET reaction_count = reaction_count + 1 \
             WHERE room_id = $1 AND id = $2 RETURNING reaction_count",
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn remove_reaction(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<i64>, AppError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE messages SET reaction_count = GREATEST(reaction_count - 1, 0) \
             WHERE room_id = $1 AND id = $2 RETURNING reaction_count",
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn mark_message_answered(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageModel>, AppError> {
        sqlx::query_as::<_, MessageModel>(
            "UPDATE messages SET answered = true WHERE room_id = $1 AND id = $2 \
             RETURNING id, room_id, message, reaction_count, answered, created_at",
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)
    }
}
