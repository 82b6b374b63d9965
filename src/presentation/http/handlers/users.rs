//! User Handlers

use axum::{extract::State, Json};

use crate::domain::RoomSummary;
use crate::presentation::http::extractors::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// The caller's rooms, most recently active first
pub async fn get_my_rooms(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    Ok(Json(state.chat.list_rooms_for_user(auth.user_id).await?))
}
