//! Admin Handlers
//!
//! Fast-cache maintenance. The durable store is never touched here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::RebuildResponse;
use crate::presentation::http::extractors::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Drop all fast-cache state
pub async fn flush_cache(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    state.chat.flush_cache().await?;
    tracing::warn!(user_id = auth.user_id, "Fast cache flushed on request");
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrite one room's cache log from the durable store
pub async fn rebuild_room_cache(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<RebuildResponse>, AppError> {
    let messages = state.chat.rebuild_room_cache(room_id).await?;
    Ok(Json(RebuildResponse { room_id, messages }))
}
