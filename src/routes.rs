use axum::{
    http::{header, Method},
    routing::{get, patch},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::room;
use crate::shared::AppState;
use crate::websockets::subscribe_handler;

/// Builds the full application router
pub fn create_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300));

    let api = Router::new()
        .route("/rooms", get(room::list_rooms).post(room::create_room))
        .route(
            "/rooms/:room_id/messages",
            get(room::get_room_messages).post(room::create_message),
        )
        .route(
            "/rooms/:room_id/messages/:message_id",
            get(room::get_room_message),
        )
        .route(
            "/rooms/:room_id/messages/:message_id/react",
            patch(room::react_to_message).delete(room::remove_reaction),
        )
        .route(
            "/rooms/:room_id/messages/:message_id/answer",
            patch(room::mark_message_answered),
        );

    Router::new()
        .route("/subscribe/:room_id", get(subscribe_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
