//! Read Tracker
//!
//! Per-message and per-room read-state bookkeeping. Marks are written to the
//! durable store first; cached log entries are then rewritten in place and
//! the room's read-users set is updated.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};

use super::cache_policy::{soft_read, soft_write};
use super::message_log::MessageLog;
use crate::domain::{Message, MessageRepository};
use crate::infrastructure::cache::{keys, FastCache};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::validation::require_id;

pub struct ReadTracker {
    messages: Arc<dyn MessageRepository>,
    log: Arc<MessageLog>,
    cache: Arc<dyn FastCache>,
}

impl ReadTracker {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        log: Arc<MessageLog>,
        cache: Arc<dyn FastCache>,
    ) -> Self {
        Self {
            messages,
            log,
            cache,
        }
    }

    /// Mark one message read by `user_id` and return its current state.
    ///
    /// Self-reads and repeated reads leave the message unchanged.
    #[instrument(skip(self), level = "debug")]
    pub async fn mark_read(
        &self,
        room_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Result<Message, AppError> {
        require_id(room_id, "room id")?;
        require_id(message_id, "message id")?;
        require_id(user_id, "user id")?;

        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .filter(|m| m.room_id == room_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Message {} not found in room {}", message_id, room_id))
            })?;

        if message.sender_id == user_id {
            return Ok(message);
        }

        let message = if self.messages.mark_read(message_id, user_id).await? {
            self.reload(message).await?
        } else {
            message
        };

        self.log.replace_cached(&message).await;
        self.add_reader(room_id, user_id).await;

        Ok(message)
    }

    /// Mark every given message not authored by `user_id` as read, returning
    /// the messages with their updated read state.
    ///
    /// Cached copies that turn out to be behind the durable store are
    /// repaired along the way.
    pub(crate) async fn mark_messages_read(
        &self,
        room_id: i64,
        messages: Vec<Message>,
        user_id: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut updated = Vec::with_capacity(messages.len());
        let mut read_any = false;

        for mut message in messages {
            if message.needs_read_mark(user_id) {
                if self.messages.mark_read(message.id, user_id).await? {
                    message.record_read(user_id);
                } else {
                    // Already marked durably: the copy we hold is stale
                    message = self.reload(message).await?;
                }
                self.log.replace_cached(&message).await;
            }
            read_any |= message.is_read_by(user_id);
            updated.push(message);
        }

        if read_any {
            self.add_reader(room_id, user_id).await;
        }

        Ok(updated)
    }

    /// Mark every message of the room not authored by `user_id` as read.
    ///
    /// Tolerates empty rooms and already-read messages. Returns the room's
    /// read count afterwards.
    #[instrument(skip(self), level = "debug")]
    pub async fn mark_all_read(&self, room_id: i64, user_id: i64) -> Result<i64, AppError> {
        require_id(room_id, "room id")?;
        require_id(user_id, "user id")?;

        let marked = self.messages.mark_all_read(room_id, user_id).await?;
        debug!(room_id = room_id, user_id = user_id, marked = marked.len(), "Marked all read");

        let stale: BTreeSet<i64> = self
            .log
            .cached_entries(room_id)
            .await
            .into_iter()
            .filter(|m| m.needs_read_mark(user_id))
            .map(|m| m.id)
            .collect();

        if !stale.is_empty() {
            let durable: HashMap<i64, Message> = self
                .messages
                .find_all_by_room(room_id)
                .await?
                .into_iter()
                .filter(|m| stale.contains(&m.id))
                .map(|m| (m.id, m))
                .collect();
            for message in durable.values() {
                self.log.replace_cached(message).await;
            }
        }

        if !marked.is_empty() {
            self.add_reader(room_id, user_id).await;
        }

        self.read_count(room_id).await
    }

    /// Number of users holding a read mark on any message of the room.
    ///
    /// An empty or unreadable read-users set is rebuilt from the durable store.
    pub async fn read_count(&self, room_id: i64) -> Result<i64, AppError> {
        require_id(room_id, "room id")?;

        let key = keys::room_read_users(room_id);
        if let Some(count) = soft_read("read_count", self.cache.scard(&key).await) {
            if count > 0 {
                return Ok(count as i64);
            }
        }

        metrics::record_cache_fallback("read_count");
        let readers = self.messages.find_readers(room_id).await?;
        for reader in &readers {
            if soft_write("read_users", self.cache.sadd(&key, *reader).await).is_none() {
                break;
            }
        }

        Ok(readers.len() as i64)
    }

    async fn reload(&self, message: Message) -> Result<Message, AppError> {
        Ok(self.messages.find_by_id(message.id).await?.unwrap_or(message))
    }

    async fn add_reader(&self, room_id: i64, user_id: i64) {
        soft_write(
            "read_users",
            self.cache.sadd(&keys::room_read_users(room_id), user_id).await,
        );
    }
}
