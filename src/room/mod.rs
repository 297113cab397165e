// Public API - what other modules can use
pub use handlers::{
    create_message, create_room, get_room_message, get_room_messages, list_rooms,
    mark_message_answered, react_to_message, remove_reaction,
};
pub use notifications::RoomNotification;
pub use service::RoomService;

// Internal modules
mod handlers;
pub mod models;
mod notifications;
pub mod repository;
mod service;
pub mod types;
