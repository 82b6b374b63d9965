//! WebSocket Connection Handler
//!
//! `GET /ws?token=…` upgrades to a socket bound to the token's user. The
//! connection is registered in the [`Gateway`](super::gateway::Gateway) for
//! its whole lifetime and handles `subscribe`, `unsubscribe`, `send` and
//! `read` frames. A failing frame produces an `error` frame; the socket
//! stays open.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{ClientFrame, ServerFrame};
use crate::domain::{InboundEvent, Topic};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Query parameters of the upgrade request
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Result<Response, AppError> {
    let user_id = state.identity.verify_token(&params.token).await?;
    let max_message_size = state.settings.websocket.max_message_size;

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id, params.token)))
}

/// Per-connection context
struct Session {
    connection_id: Uuid,
    user_id: i64,
    token: String,
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: i64, token: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(state.gateway.queue_capacity());

    let connection_id = state.gateway.register(user_id, tx.clone());
    let session = Session {
        connection_id,
        user_id,
        token,
    };

    // Forward queued frames to the socket
    let mut sender_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    reply(
        &tx,
        ServerFrame::Ready {
            connection_id,
            user_id,
        },
    )
    .await;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match handle_frame(&state, &session, text.as_str()).await {
                            Ok(frame) => frame,
                            Err(e) => {
                                debug!(
                                    connection_id = %connection_id,
                                    error = %e,
                                    "Client frame rejected"
                                );
                                ServerFrame::error(&e)
                            }
                        };
                        reply(&tx, frame).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let e = AppError::InvalidArgument("binary frames are not supported".into());
                        reply(&tx, ServerFrame::error(&e)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id = %connection_id, "Connection closed");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong is answered by axum
                    }
                    Some(Err(e)) => {
                        debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            _ = &mut sender_task => {
                debug!(connection_id = %connection_id, "Socket writer stopped");
                break;
            }
        }
    }

    state.gateway.unregister(connection_id);
    sender_task.abort();

    info!(
        user_id = user_id,
        connection_id = %connection_id,
        "User disconnected"
    );
}

async fn reply(tx: &mpsc::Sender<String>, frame: ServerFrame) {
    match frame.to_text() {
        Ok(text) => {
            let _ = tx.send(text).await;
        }
        Err(e) => warn!(error = %e, "Failed to encode reply frame"),
    }
}

/// Handle one client frame and produce its reply
async fn handle_frame(
    state: &AppState,
    session: &Session,
    text: &str,
) -> Result<ServerFrame, AppError> {
    let frame: ClientFrame = serde_json::from_str(text)?;

    match frame {
        ClientFrame::Subscribe { topic } => {
            authorize_topic(state, &topic).await?;
            state.gateway.subscribe(session.connection_id, topic);
            Ok(ServerFrame::Subscribed { topic })
        }

        ClientFrame::Unsubscribe { topic } => {
            state.gateway.unsubscribe(session.connection_id, &topic);
            Ok(ServerFrame::Unsubscribed { topic })
        }

        ClientFrame::Send {
            room_id,
            message_type,
            content,
        } => {
            // Every event is re-authenticated, so an expired token stops sending
            let event = InboundEvent {
                room_id,
                sender_token: session.token.clone(),
                message_type,
                content,
            };
            let result = state.chat.handle_event(event).await?;
            Ok(ServerFrame::Sent { result })
        }

        ClientFrame::Read {
            room_id,
            message_id: Some(message_id),
        } => {
            let message = state
                .chat
                .mark_read(room_id, message_id, session.user_id)
                .await?;
            Ok(ServerFrame::Read { message })
        }

        ClientFrame::Read {
            room_id,
            message_id: None,
        } => {
            let status = state.chat.mark_all_read(room_id, session.user_id).await?;
            Ok(ServerFrame::ReadAll { status })
        }
    }
}

/// Room topics require the room to exist.
async fn authorize_topic(state: &AppState, topic: &Topic) -> Result<(), AppError> {
    match topic {
        Topic::Room(room_id) | Topic::RoomRead(room_id) => {
            state.chat.get_room(*room_id).await.map(|_| ())
        }
        Topic::Rooms => Ok(()),
    }
}
