use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::hub::{Hub, HubError};
use crate::room::repository::RoomRepository;
use crate::room::RoomService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_repository: Arc<dyn RoomRepository + Send + Sync>,
    pub hub: Hub,
    pub hub_config: HubConfig,
    /// Fires on server shutdown; every subscription observes it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(room_repository: Arc<dyn RoomRepository + Send + Sync>, hub_config: HubConfig) -> Self {
        Self {
            room_repository,
            hub: Hub::new(hub_config.clone()),
            hub_config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn room_service(&self) -> RoomService {
        RoomService::new(Arc::clone(&self.room_repository), self.hub.clone())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::TopicNotFound(room_id) => {
                AppError::NotFound(format!("Room {} not found", room_id))
            }
            HubError::Store(msg) => AppError::DatabaseError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
