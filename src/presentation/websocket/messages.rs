//! WebSocket Message Types
//!
//! JSON frames exchanged with connected clients. Every frame carries a
//! `type` tag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Dispatched, Message, ReadStatus, ServerEvent, Topic};
use crate::shared::error::AppError;

/// Incoming client frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving events published on `topic`
    Subscribe { topic: Topic },
    /// Stop receiving events published on `topic`
    Unsubscribe { topic: Topic },
    /// Send an `ENTER`/`TALK`/`EXIT`/`MATCH_REQUEST`/`MATCH` event
    Send {
        room_id: i64,
        message_type: String,
        #[serde(default)]
        content: String,
    },
    /// Mark one message read, or the whole room when `message_id` is absent
    Read {
        room_id: i64,
        #[serde(default)]
        message_id: Option<i64>,
    },
}

/// Outgoing server frame
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame of every connection
    Ready { connection_id: Uuid, user_id: i64 },
    /// Event published on a subscribed topic
    Event { topic: Topic, payload: ServerEvent },
    Subscribed { topic: Topic },
    Unsubscribed { topic: Topic },
    /// Result of a `send` frame
    Sent { result: Dispatched },
    /// Result of a single-message `read` frame
    Read { message: Message },
    /// Result of a whole-room `read` frame
    ReadAll { status: ReadStatus },
    /// A client frame failed; the connection stays open
    Error {
        code: u16,
        message: String,
        retryable: bool,
    },
}

impl ServerFrame {
    pub fn error(error: &AppError) -> Self {
        ServerFrame::Error {
            code: error.code(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    /// Encode for the wire.
    pub fn to_text(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}
