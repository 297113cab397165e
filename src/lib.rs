// Library crate for the room subscription server
// This file exposes the public API for integration tests

pub mod config;
pub mod hub;
pub mod room;
pub mod routes;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::{AppConfig, HubConfig};
pub use hub::{CancellationToken, Connection, Hub, HubError, TerminationCause};
pub use room::{
    models::{MessageModel, RoomModel},
    repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository},
    RoomNotification,
};
pub use routes::create_router;
pub use shared::{AppError, AppState};
