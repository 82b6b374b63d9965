//! Room Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{
    AddMemberRequest, CreateRoomRequest, MemberChangeResponse, ReadCountResponse,
};
use crate::domain::{ReadStatus, Room, UserProfile};
use crate::presentation::http::extractors::{AuthUser, ValidatedJson};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create a room
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let room = state.chat.create_room(&body.name).await?;
    tracing::info!(room_id = room.id, user_id = auth.user_id, "Room created over HTTP");
    Ok((StatusCode::CREATED, Json(room)))
}

/// Get a room
pub async fn get_room(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<Room>, AppError> {
    Ok(Json(state.chat.get_room(room_id).await?))
}

/// Delete a room with its messages and memberships
pub async fn delete_room(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.chat.delete_room(room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List member profiles
pub async fn list_members(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.chat.list_members(room_id).await?))
}

/// Add a member. Adding an existing member succeeds with `changed: false`.
pub async fn add_member(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<AddMemberRequest>,
) -> Result<Json<MemberChangeResponse>, AppError> {
    let changed = state.chat.add_member(room_id, body.user_id).await?;
    Ok(Json(MemberChangeResponse {
        room_id,
        user_id: body.user_id,
        changed,
    }))
}

/// Remove a member. Removing a non-member succeeds with `changed: false`.
pub async fn remove_member(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((room_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<MemberChangeResponse>, AppError> {
    let changed = state.chat.remove_member(room_id, user_id).await?;
    Ok(Json(MemberChangeResponse {
        room_id,
        user_id,
        changed,
    }))
}

/// Mark every message of the room read by the caller
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<ReadStatus>, AppError> {
    Ok(Json(state.chat.mark_all_read(room_id, auth.user_id).await?))
}

/// Number of users who have read anything in the room
pub async fn read_count(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<ReadCountResponse>, AppError> {
    let read_count = state.chat.get_read_count(room_id).await?;
    Ok(Json(ReadCountResponse {
        room_id,
        read_count,
    }))
}
