//! Message Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::{MessagePageQuery, SendMessageRequest};
use crate::domain::{Dispatched, Message};
use crate::presentation::http::extractors::{AuthUser, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Get a page of messages, oldest first. Marks them read for the caller.
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
    Query(query): Query<MessagePageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    query.validate().map_err(validation_error)?;

    let messages = state
        .chat
        .get_messages(room_id, query.page, query.size, auth.user_id)
        .await?;
    Ok(Json(messages))
}

/// Send a message of any supported type as the caller
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Dispatched>), AppError> {
    let dispatched = state
        .chat
        .send_message(room_id, auth.user_id, &body.content, &body.message_type)
        .await?;

    let status = match dispatched {
        Dispatched::Persisted(_) => StatusCode::CREATED,
        Dispatched::Broadcast(_) => StatusCode::ACCEPTED,
    };
    Ok((status, Json(dispatched)))
}

/// Mark one message read by the caller
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((room_id, message_id)): Path<(i64, i64)>,
) -> Result<Json<Message>, AppError> {
    Ok(Json(
        state
            .chat
            .mark_read(room_id, message_id, auth.user_id)
            .await?,
    ))
}
