use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::hub::Admission;
use crate::shared::{AppError, AppState};

use super::socket::socket_channel;

/// WebSocket upgrade handler
///
/// GET /subscribe/:room_id
/// Validates the room before upgrading, so a missing room is a plain 404.
#[instrument(name = "subscribe_handler", skip(state, ws))]
pub async fn subscribe_handler(
    Path(room_id): Path<Uuid>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let admission = state
        .hub
        .admit(state.room_repository.as_ref(), room_id)
        .await?;

    info!(room_id = %room_id, "Upgrading subscription to WebSocket");

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, admission, state)))
}

/// Runs one subscription for the lifetime of its socket.
///
/// The lifecycle manager and the socket pump share this task. When the
/// subscription ends, the pump is released and closes the socket, which keeps
/// connection teardown in one place.
async fn handle_websocket(socket: WebSocket, admission: Admission, state: AppState) {
    let room_id = admission.topic();
    let (connection, pump) = socket_channel(Box::new(socket), state.hub_config.outbound_buffer);
    let release = CancellationToken::new();

    let subscription = async {
        let cause = admission
            .run(Arc::new(connection), state.shutdown.child_token())
            .await;
        release.cancel();
        cause
    };

    let (cause, pumped) = tokio::join!(subscription, pump.run(release.clone()));

    info!(
        room_id = %room_id,
        cause = ?cause,
        clean = pumped.is_ok(),
        "WebSocket subscription closed"
    );
}
