// Public API
pub use handler::subscribe_handler;
pub use socket::{socket_channel, SocketConnection, SocketError, SocketPump, SocketWrapper};

// Internal modules
mod handler;
mod socket;
