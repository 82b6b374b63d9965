//! Message Log
//!
//! Per-room append-only ordered message sequence. Appends write through the
//! durable store (which assigns the id) and then into the room's cache-side
//! log; reads use the cache log and fall back to the durable store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::cache_policy::{soft_read, soft_write};
use crate::domain::{IdentityService, Message, MessageRepository, MessageType, NewMessage};
use crate::infrastructure::cache::{keys, message_codec, FastCache};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::validation::require_id;

pub struct MessageLog {
    messages: Arc<dyn MessageRepository>,
    cache: Arc<dyn FastCache>,
    identity: Arc<dyn IdentityService>,
}

impl MessageLog {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        cache: Arc<dyn FastCache>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            messages,
            cache,
            identity,
        }
    }

    /// Append a message to a room's log.
    ///
    /// The durable write is fatal on failure; cache writes are not.
    #[instrument(skip(self, content), level = "debug")]
    pub async fn append(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, AppError> {
        require_id(room_id, "room id")?;
        require_id(sender_id, "sender id")?;

        let sender_name = self.identity.get_user_name(sender_id).await?;
        let pending = NewMessage::new(room_id, sender_id, sender_name, content, message_type);
        let message = self.messages.create(&pending).await?;

        self.cache_append(&message).await;
        metrics::record_message_appended(message_type.as_str());
        debug!(room_id = room_id, message_id = message.id, "Message appended");

        Ok(message)
    }

    /// Write a durable message into the cache-side state of its room.
    async fn cache_append(&self, message: &Message) {
        let key = keys::room_messages(message.room_id);
        let score = message.score();

        // A log emptied by a flush would otherwise restart with only this entry.
        // A concurrent rebuild may have missed this message, so fall through.
        match self.cache.zrange(&key, 0, 0).await {
            Ok(head) if head.is_empty() => {
                if let Err(e) = self.rebuild(message.room_id).await {
                    warn!(room_id = message.room_id, error = %e, "Cache log rebuild failed");
                    metrics::record_cache_write_failure("log_rebuild");
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(room_id = message.room_id, error = %e, "Cache log unavailable");
                metrics::record_cache_write_failure("log_append");
                return;
            }
        }

        let Some(member) = soft_write("log_append", message_codec::encode(message)) else {
            return;
        };

        let same_score = soft_read("log_append", self.cache.zrange_by_score(&key, score, score).await)
            .unwrap_or_default();
        if same_score
            .iter()
            .any(|existing| message_codec::is_member_of(existing, message.id))
        {
            debug!(message_id = message.id, "Duplicate cache append suppressed");
        } else {
            soft_write("log_append", self.cache.zadd(&key, &member, score).await);
        }

        self.touch(message).await;
    }

    /// Update the latest-message snippet and the room's activity score.
    ///
    /// Never moves the activity score backwards, so a rebuild working from
    /// an older snapshot does not undo a newer append.
    async fn touch(&self, message: &Message) {
        let current = soft_read(
            "room_activity",
            self.cache
                .zscore(keys::ROOM_ACTIVITY, &message.room_id.to_string())
                .await,
        )
        .flatten();
        if current.is_some_and(|score| score > message.score()) {
            return;
        }

        soft_write(
            "latest_message",
            self.cache
                .set(&keys::room_latest_message(message.room_id), &message.content)
                .await,
        );
        soft_write(
            "room_activity",
            self.cache
                .zadd(
                    keys::ROOM_ACTIVITY,
                    &message.room_id.to_string(),
                    message.score(),
                )
                .await,
        );
    }

    /// Messages at ranks `[offset, offset + limit)`, oldest first.
    ///
    /// Reads the cache log; an empty or unreadable log falls back to the
    /// durable store without writing back.
    #[instrument(skip(self), level = "debug")]
    pub async fn page(&self, room_id: i64, offset: i64, limit: i64) -> Result<Vec<Message>, AppError> {
        require_id(room_id, "room id")?;
        if offset < 0 {
            return Err(AppError::InvalidArgument("offset must not be negative".into()));
        }
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let out_of_range = || AppError::InvalidArgument("page is out of range".into());
        let start = isize::try_from(offset).map_err(|_| out_of_range())?;
        let stop = offset
            .checked_add(limit - 1)
            .and_then(|stop| isize::try_from(stop).ok())
            .ok_or_else(out_of_range)?;

        let key = keys::room_messages(room_id);
        let cached = soft_read("page", self.cache.zrange(&key, start, stop).await)
            .unwrap_or_default();

        if !cached.is_empty() {
            return Ok(collapse_duplicates(decode_members(room_id, &cached)));
        }

        metrics::record_cache_fallback("page");
        debug!(room_id = room_id, offset = offset, limit = limit, "Page served by durable store");
        self.messages.find_page(room_id, offset, limit).await
    }

    /// Content of the room's most recent message.
    pub async fn latest_snippet(&self, room_id: i64) -> Result<Option<String>, AppError> {
        require_id(room_id, "room id")?;

        let key = keys::room_latest_message(room_id);
        if let Some(Some(content)) = soft_read("latest_message", self.cache.get(&key).await) {
            return Ok(Some(content));
        }

        metrics::record_cache_fallback("latest_message");
        let latest = self.messages.find_latest(room_id).await?;
        if let Some(message) = &latest {
            soft_write("latest_message", self.cache.set(&key, &message.content).await);
        }

        Ok(latest.map(|m| m.content))
    }

    /// Replace every cached copy of `message` with its current state.
    ///
    /// Only rewrites entries that exist; a message absent from the cache log
    /// is not inserted.
    pub async fn replace_cached(&self, message: &Message) {
        let key = keys::room_messages(message.room_id);
        let score = message.score();

        let Some(same_score) =
            soft_read("log_rewrite", self.cache.zrange_by_score(&key, score, score).await)
        else {
            return;
        };
        let Some(member) = soft_write("log_rewrite", message_codec::encode(message)) else {
            return;
        };

        let stale: Vec<String> = same_score
            .into_iter()
            .filter(|existing| message_codec::is_member_of(existing, message.id))
            .filter(|existing| *existing != member)
            .collect();
        if stale.is_empty() {
            return;
        }

        // Add first so the message never disappears from the log
        soft_write("log_rewrite", self.cache.zadd(&key, &member, score).await);
        soft_write("log_rewrite", self.cache.zrem(&key, &stale).await);
    }

    /// Every cached log entry of a room, decoded.
    pub(crate) async fn cached_entries(&self, room_id: i64) -> Vec<Message> {
        let members = soft_read(
            "log_scan",
            self.cache.zrange(&keys::room_messages(room_id), 0, -1).await,
        )
        .unwrap_or_default();
        collapse_duplicates(decode_members(room_id, &members))
    }

    /// Merge the durable log of a room into its cache log, then refresh the
    /// latest snippet and activity entry. Returns the number of durable
    /// messages.
    ///
    /// The log is never cleared, so entries written by concurrent appends
    /// survive. Copies behind the durable read state are replaced; members
    /// that do not decode are removed.
    #[instrument(skip(self), level = "debug")]
    pub async fn rebuild(&self, room_id: i64) -> Result<usize, AppError> {
        require_id(room_id, "room id")?;

        let messages = self.messages.find_all_by_room(room_id).await?;
        let key = keys::room_messages(room_id);

        let mut cached: HashMap<i64, Vec<(String, i32)>> = HashMap::new();
        let mut corrupt = Vec::new();
        for member in self.cache.zrange(&key, 0, -1).await? {
            match message_codec::decode(&member) {
                Ok(message) => cached
                    .entry(message.id)
                    .or_default()
                    .push((member, message.read_by_count)),
                Err(_) => corrupt.push(member),
            }
        }

        let mut added = 0usize;
        let mut replaced = 0usize;
        for message in &messages {
            let member = message_codec::encode(message)?;
            match cached.get(&message.id) {
                None => {
                    self.cache.zadd(&key, &member, message.score()).await?;
                    added += 1;
                }
                Some(copies) => {
                    let current = copies.iter().any(|(existing, read_by_count)| {
                        *existing == member || *read_by_count >= message.read_by_count
                    });
                    if current {
                        continue;
                    }
                    // Add first so the message never disappears from the log
                    self.cache.zadd(&key, &member, message.score()).await?;
                    let stale: Vec<String> =
                        copies.iter().map(|(existing, _)| existing.clone()).collect();
                    self.cache.zrem(&key, &stale).await?;
                    replaced += 1;
                }
            }
        }
        if !corrupt.is_empty() {
            self.cache.zrem(&key, &corrupt).await?;
        }
        if let Some(latest) = messages.last() {
            self.touch(latest).await;
        }

        debug!(
            room_id = room_id,
            count = messages.len(),
            added = added,
            replaced = replaced,
            dropped = corrupt.len(),
            "Cache log rebuilt"
        );
        Ok(messages.len())
    }

    /// Delete a room's messages from the durable store and its message
    /// state from the cache.
    pub(crate) async fn purge(&self, room_id: i64) -> Result<u64, AppError> {
        let deleted = self.messages.delete_by_room(room_id).await?;

        soft_write(
            "room_purge",
            self.cache
                .delete(&[
                    keys::room_messages(room_id),
                    keys::room_latest_message(room_id),
                    keys::room_read_users(room_id),
                ])
                .await,
        );

        Ok(deleted)
    }
}

/// Decode log members, dropping the ones that fail.
fn decode_members(room_id: i64, members: &[String]) -> Vec<Message> {
    members
        .iter()
        .filter_map(|member| match message_codec::decode(member) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(room_id = room_id, error = %e, "Skipping undecodable cached message");
                None
            }
        })
        .collect()
}

/// Keep one entry per message id, at its first position, carrying the most
/// advanced read state.
fn collapse_duplicates(messages: Vec<Message>) -> Vec<Message> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(messages.len());
    let mut result: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match positions.get(&message.id) {
            Some(&index) => {
                if message.read_by_count > result[index].read_by_count {
                    result[index] = message;
                }
            }
            None => {
                positions.insert(message.id, result.len());
                result.push(message);
            }
        }
    }

    result
}
