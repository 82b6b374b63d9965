//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // WebSocket endpoint, authenticated by `?token=`
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes. Every handler authenticates through `AuthUser`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/rooms", room_routes())
        .nest("/users", user_routes())
        .nest("/admin", admin_routes())
}

/// Room routes
fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::rooms::create_room))
        .route(
            "/{room_id}",
            get(handlers::rooms::get_room).delete(handlers::rooms::delete_room),
        )
        .route(
            "/{room_id}/members",
            get(handlers::rooms::list_members).post(handlers::rooms::add_member),
        )
        .route(
            "/{room_id}/members/{user_id}",
            delete(handlers::rooms::remove_member),
        )
        .route(
            "/{room_id}/messages",
            get(handlers::messages::get_messages).post(handlers::messages::send_message),
        )
        .route(
            "/{room_id}/messages/{message_id}/read",
            post(handlers::messages::mark_read),
        )
        .route("/{room_id}/read", post(handlers::rooms::mark_all_read))
        .route("/{room_id}/read-count", get(handlers::rooms::read_count))
}

/// User routes
fn user_routes() -> Router<AppState> {
    Router::new().route("/@me/rooms", get(handlers::users::get_my_rooms))
}

/// Cache maintenance routes
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/cache", delete(handlers::admin::flush_cache))
        .route(
            "/rooms/{room_id}/cache",
            post(handlers::admin::rebuild_room_cache),
        )
}
