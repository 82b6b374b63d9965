//! Event types exchanged between the connection layer and the engine.
//!
//! Inbound client events are parsed into the tagged [`ChatEvent`] variant and
//! dispatched per type. Outbound events are [`ServerEvent`]s published on a
//! [`Topic`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::entities::{Message, MessageType, RoomSummary};
use crate::shared::error::AppError;

/// Broadcast topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topic {
    /// `room/{id}`: new messages and system notices
    Room(i64),
    /// `room/{id}/read`: read-receipt updates
    RoomRead(i64),
    /// `rooms`: room-list reordering hints
    Rooms,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Room(id) => write!(f, "room/{}", id),
            Topic::RoomRead(id) => write!(f, "room/{}/read", id),
            Topic::Rooms => f.write_str("rooms"),
        }
    }
}

impl FromStr for Topic {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidArgument(format!("unknown topic: {}", s));

        if s == "rooms" {
            return Ok(Topic::Rooms);
        }

        let rest = s.strip_prefix("room/").ok_or_else(invalid)?;
        let (id, read) = match rest.strip_suffix("/read") {
            Some(id) => (id, true),
            None => (rest, false),
        };
        let id: i64 = id.parse().map_err(|_| invalid())?;
        if id <= 0 {
            return Err(invalid());
        }

        Ok(if read { Topic::RoomRead(id) } else { Topic::Room(id) })
    }
}

impl TryFrom<String> for Topic {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

/// Raw inbound event as delivered by the connection layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub room_id: i64,
    pub sender_token: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub content: String,
}

/// Parsed inbound event, one variant per supported message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Bring `invitee` into the room
    Enter { invitee: i64 },
    /// Regular chat message
    Talk { content: String },
    /// Sender leaves the room
    Exit,
    /// Sender asks to be matched
    MatchRequest,
    /// Match completed
    Match,
}

impl ChatEvent {
    /// Build the typed event from a message type and its raw content.
    pub fn parse(message_type: &str, content: &str) -> Result<Self, AppError> {
        let event = match message_type.parse::<MessageType>()? {
            MessageType::Enter => {
                let invitee = content.trim().parse::<i64>().map_err(|_| {
                    AppError::InvalidArgument(format!("invalid invitee id: {}", content))
                })?;
                ChatEvent::Enter { invitee }
            }
            MessageType::Talk => ChatEvent::Talk {
                content: content.to_string(),
            },
            MessageType::Exit => ChatEvent::Exit,
            MessageType::MatchRequest => ChatEvent::MatchRequest,
            MessageType::Match => ChatEvent::Match,
        };
        Ok(event)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ChatEvent::Enter { .. } => MessageType::Enter,
            ChatEvent::Talk { .. } => MessageType::Talk,
            ChatEvent::Exit => MessageType::Exit,
            ChatEvent::MatchRequest => MessageType::MatchRequest,
            ChatEvent::Match => MessageType::Match,
        }
    }
}

/// Sender name used for notices not attributed to a user.
pub const SYSTEM_SENDER: &str = "System";

/// Transient broadcast-only notice (never persisted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub room_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl SystemNotice {
    pub fn new(
        message_type: MessageType,
        room_id: i64,
        sender_id: Option<i64>,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            sent_at: Utc::now().trunc_subsecs(3),
        }
    }
}

/// Read-receipt update for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStatus {
    pub room_id: i64,
    pub user_id: i64,
    pub read_count: i64,
}

/// Outbound event pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    MessageCreated(Message),
    SystemNotice(SystemNotice),
    ReadStatus(ReadStatus),
    RoomUpdated(RoomSummary),
    RoomDeleted { room_id: i64 },
}

/// Result of sending a message: persisted types yield the durable message,
/// broadcast-only types a transient notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dispatched {
    Persisted(Message),
    Broadcast(SystemNotice),
}

impl Dispatched {
    pub fn content(&self) -> &str {
        match self {
            Dispatched::Persisted(m) => &m.content,
            Dispatched::Broadcast(n) => &n.content,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Dispatched::Persisted(m) => Some(m),
            Dispatched::Broadcast(_) => None,
        }
    }
}

/// Fan-out seam: best-effort delivery to the current subscribers of a topic.
///
/// Implementations must not block on slow subscribers.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &Topic, event: ServerEvent);
}
