//! Message entity and repository trait.
//!
//! Maps to the `messages` and `message_reads` tables in the database schema.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Inbound event / message types.
///
/// `Enter`, `Talk` and `Exit` are persisted to the message log;
/// `MatchRequest` and `Match` are broadcast-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A user was brought into the room
    Enter,
    /// A regular chat message
    Talk,
    /// A user left the room
    Exit,
    /// A user asked to be matched
    MatchRequest,
    /// A match was completed
    Match,
}

impl MessageType {
    /// Convert to the wire/database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Talk => "TALK",
            Self::Exit => "EXIT",
            Self::MatchRequest => "MATCH_REQUEST",
            Self::Match => "MATCH",
        }
    }

    /// Whether messages of this type are written to the message log.
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Enter | Self::Talk | Self::Exit)
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTER" => Ok(Self::Enter),
            "TALK" => Ok(Self::Talk),
            "EXIT" => Ok(Self::Exit),
            "MATCH_REQUEST" => Ok(Self::MatchRequest),
            "MATCH" => Ok(Self::Match),
            _ => Err(AppError::UnsupportedMessageType(s.to_string())),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message that has been assigned its `sent_at` but has no durable id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    /// Stamp a new message with the current time.
    ///
    /// `sent_at` is truncated to milliseconds so it matches the cache score exactly.
    pub fn new(
        room_id: i64,
        sender_id: i64,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            message_type,
            sent_at: Utc::now().trunc_subsecs(3),
        }
    }
}

/// A durable message in a room's log.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - room_id: BIGINT NOT NULL
/// - sender_id: BIGINT NOT NULL
/// - sender_name: VARCHAR(100) NOT NULL
/// - content: TEXT NOT NULL
/// - message_type: VARCHAR(16) NOT NULL
/// - sent_at: TIMESTAMPTZ NOT NULL (sole ordering key within a room)
/// - read_by_count: INTEGER NOT NULL DEFAULT 0
///
/// `read_by` is aggregated from `message_reads`. Everything except the read
/// state is immutable after creation, and the read state only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
    pub read_by_count: i32,
    #[serde(default)]
    pub read_by: BTreeSet<i64>,
}

impl Message {
    /// Attach a durable id to a pending message.
    pub fn from_new(id: i64, new: NewMessage) -> Self {
        Self {
            id,
            room_id: new.room_id,
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            content: new.content,
            message_type: new.message_type,
            sent_at: new.sent_at,
            read_by_count: 0,
            read_by: BTreeSet::new(),
        }
    }

    /// Whether `user_id` has a read mark on this message.
    pub fn is_read_by(&self, user_id: i64) -> bool {
        self.read_by.contains(&user_id)
    }

    /// Whether a read mark by `user_id` would change this message.
    pub fn needs_read_mark(&self, user_id: i64) -> bool {
        self.sender_id != user_id && !self.is_read_by(user_id)
    }

    /// Add a read mark. Authors never read their own message.
    ///
    /// Returns true if the read state changed.
    pub fn record_read(&mut self, user_id: i64) -> bool {
        if self.sender_id == user_id || !self.read_by.insert(user_id) {
            return false;
        }
        self.read_by_count += 1;
        true
    }

    /// Score of this message in the cache-side ordered log (epoch millis).
    pub fn score(&self) -> f64 {
        self.sent_at.timestamp_millis() as f64
    }
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a pending message and return it with its durable id.
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError>;

    /// Find a message by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Page through a room's messages ordered by `sent_at`, then id, ascending.
    async fn find_page(
        &self,
        room_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// The most recent message of a room.
    async fn find_latest(&self, room_id: i64) -> Result<Option<Message>, AppError>;

    /// Every message of a room in log order.
    async fn find_all_by_room(&self, room_id: i64) -> Result<Vec<Message>, AppError>;

    /// Latest `sent_at` per room, for rooms that have messages.
    async fn last_activity(
        &self,
        room_ids: &[i64],
    ) -> Result<Vec<(i64, DateTime<Utc>)>, AppError>;

    /// Delete every message of a room. Returns the number deleted.
    async fn delete_by_room(&self, room_id: i64) -> Result<u64, AppError>;

    /// Add a read mark unless `user_id` authored the message or already read it.
    ///
    /// Returns true if a mark was added (and `read_by_count` incremented).
    async fn mark_read(&self, message_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Mark every message in the room not authored by `user_id`.
    ///
    /// Returns the ids of messages that gained a mark.
    async fn mark_all_read(&self, room_id: i64, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Distinct users holding a read mark on any message of the room.
    async fn find_readers(&self, room_id: i64) -> Result<Vec<i64>, AppError>;
}
