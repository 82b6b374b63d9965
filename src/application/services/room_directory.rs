//! Room Directory
//!
//! Room identity and membership, cache-aside over the durable store.
//!
//! Cache layout used here: the `rooms` hash, the `rooms:deleted` tombstone
//! set, the `user:{id}:rooms` and `room:{id}:users` indexes and the
//! `room:activity` ranking.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::cache_policy::{soft_read, soft_write};
use super::message_log::MessageLog;
use crate::domain::{
    IdentityService, MembershipRepository, MessageRepository, Room, RoomRepository, RoomSummary,
    UserProfile,
};
use crate::infrastructure::cache::{keys, FastCache};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::validation::require_id;

pub struct RoomDirectory {
    rooms: Arc<dyn RoomRepository>,
    memberships: Arc<dyn MembershipRepository>,
    messages: Arc<dyn MessageRepository>,
    log: Arc<MessageLog>,
    cache: Arc<dyn FastCache>,
    identity: Arc<dyn IdentityService>,
}

impl RoomDirectory {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        memberships: Arc<dyn MembershipRepository>,
        messages: Arc<dyn MessageRepository>,
        log: Arc<MessageLog>,
        cache: Arc<dyn FastCache>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            rooms,
            memberships,
            messages,
            log,
            cache,
            identity,
        }
    }

    /// Create a room. The durable store assigns its id.
    #[instrument(skip(self), level = "debug")]
    pub async fn create(&self, name: &str) -> Result<Room, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("room name is required".into()));
        }

        let room = self.rooms.create(name).await?;
        // A tombstone left under this id must not hide the new room
        soft_write(
            "room_put",
            self.cache.srem(keys::DELETED_ROOMS, room.id).await,
        );
        self.cache_room(&room).await;

        info!(room_id = room.id, "Room created");
        Ok(room)
    }

    /// Resolve a room, cache first.
    pub async fn get(&self, room_id: i64) -> Result<Room, AppError> {
        require_id(room_id, "room id")?;

        let field = room_id.to_string();
        if let Some(Some(json)) = soft_read("room_get", self.cache.hget(keys::ROOMS, &field).await) {
            match serde_json::from_str::<Room>(&json) {
                Ok(room) => return Ok(room),
                Err(e) => warn!(room_id = room_id, error = %e, "Undecodable cached room"),
            }
        }

        metrics::record_cache_fallback("room_get");
        if soft_read(
            "room_get",
            self.cache.sismember(keys::DELETED_ROOMS, room_id).await,
        ) == Some(true)
        {
            return Err(not_found(room_id));
        }

        let room = self
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| not_found(room_id))?;
        self.cache_room(&room).await;

        Ok(room)
    }

    /// Delete a room with its messages, memberships and cache state.
    ///
    /// The room is tombstoned in the cache before its durable row goes, so a
    /// concurrent read-through cannot bring it back.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, room_id: i64) -> Result<(), AppError> {
        require_id(room_id, "room id")?;
        if self.rooms.find_by_id(room_id).await?.is_none() {
            return Err(not_found(room_id));
        }

        let purged = self.log.purge(room_id).await?;

        let former_members = self.memberships.delete_by_room(room_id).await?;
        for user_id in &former_members {
            soft_write(
                "room_delete",
                self.cache.srem(&keys::user_rooms(user_id), room_id).await,
            );
        }
        soft_write(
            "room_delete",
            self.cache.delete(&[keys::room_users(room_id)]).await,
        );

        let field = room_id.to_string();
        soft_write(
            "room_delete",
            self.cache.sadd(keys::DELETED_ROOMS, room_id).await,
        );
        soft_write("room_delete", self.cache.hdel(keys::ROOMS, &field).await);
        soft_write(
            "room_delete",
            self.cache.zrem(keys::ROOM_ACTIVITY, &[field.clone()]).await,
        );

        if !self.rooms.delete(room_id).await? {
            // A concurrent delete removed the row first; its tombstone stays
            return Err(not_found(room_id));
        }
        // A read-through may have raced the steps above
        soft_write("room_delete", self.cache.hdel(keys::ROOMS, &field).await);

        info!(
            room_id = room_id,
            messages = purged,
            members = former_members.len(),
            "Room deleted"
        );
        Ok(())
    }

    /// Add a member. Adding an existing member is a no-op.
    ///
    /// Returns true if the membership was created.
    #[instrument(skip(self), level = "debug")]
    pub async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        require_id(user_id, "user id")?;
        self.get(room_id).await?;

        let added = self.memberships.add(room_id, user_id).await?;
        soft_write(
            "member_add",
            self.cache.sadd(&keys::user_rooms(user_id), room_id).await,
        );
        soft_write(
            "member_add",
            self.cache.sadd(&keys::room_users(room_id), user_id).await,
        );

        debug!(room_id = room_id, user_id = user_id, added = added, "Member added");
        Ok(added)
    }

    /// Remove a member. Removing a non-member is a no-op.
    ///
    /// Returns true if a membership was removed.
    #[instrument(skip(self), level = "debug")]
    pub async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        require_id(room_id, "room id")?;
        require_id(user_id, "user id")?;

        let removed = self.memberships.remove(room_id, user_id).await?;
        soft_write(
            "member_remove",
            self.cache.srem(&keys::user_rooms(user_id), room_id).await,
        );
        soft_write(
            "member_remove",
            self.cache.srem(&keys::room_users(room_id), user_id).await,
        );

        debug!(room_id = room_id, user_id = user_id, removed = removed, "Member removed");
        Ok(removed)
    }

    /// Whether `user_id` belongs to the room.
    pub async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        if soft_read(
            "member_check",
            self.cache.sismember(&keys::room_users(room_id), user_id).await,
        ) == Some(true)
        {
            return Ok(true);
        }
        self.memberships.exists(room_id, user_id).await
    }

    /// Member ids of a room, ascending.
    pub async fn member_ids(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        require_id(room_id, "room id")?;

        let key = keys::room_users(room_id);
        if let Some(mut ids) = soft_read("room_members", self.cache.smembers(&key).await) {
            if !ids.is_empty() {
                ids.sort_unstable();
                return Ok(ids);
            }
        }

        metrics::record_cache_fallback("room_members");
        let ids = self.memberships.find_user_ids_by_room(room_id).await?;
        for user_id in &ids {
            if soft_write("room_members", self.cache.sadd(&key, *user_id).await).is_none() {
                break;
            }
        }
        Ok(ids)
    }

    /// Profiles of a room's members, ordered by user id.
    pub async fn list_members(&self, room_id: i64) -> Result<Vec<UserProfile>, AppError> {
        self.get(room_id).await?;
        self.member_profiles(room_id).await
    }

    async fn member_profiles(&self, room_id: i64) -> Result<Vec<UserProfile>, AppError> {
        let ids = self.member_ids(room_id).await?;
        let mut profiles = Vec::with_capacity(ids.len());
        for user_id in ids {
            match self.identity.get_user_profile(user_id).await {
                Ok(profile) => profiles.push(profile),
                Err(AppError::NotFound(_)) => {
                    warn!(room_id = room_id, user_id = user_id, "Member without a profile")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(profiles)
    }

    /// Room-list entry for one room.
    pub async fn summarize(&self, room: Room) -> Result<RoomSummary, AppError> {
        let latest_message = self.log.latest_snippet(room.id).await?;
        let members = self.member_profiles(room.id).await?;
        Ok(RoomSummary {
            room,
            latest_message,
            members,
        })
    }

    /// A user's rooms, most recently active first; rooms without any
    /// activity follow in ascending id order.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_rooms_for_user(&self, user_id: i64) -> Result<Vec<RoomSummary>, AppError> {
        require_id(user_id, "user id")?;

        let index_key = keys::user_rooms(user_id);
        let room_ids = match soft_read("user_rooms", self.cache.smembers(&index_key).await) {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                metrics::record_cache_fallback("user_rooms");
                let ids = self.memberships.find_room_ids_by_user(user_id).await?;
                for room_id in &ids {
                    if soft_write("user_rooms", self.cache.sadd(&index_key, *room_id).await)
                        .is_none()
                    {
                        break;
                    }
                }
                ids
            }
        };

        let mut rooms = Vec::with_capacity(room_ids.len());
        for room_id in room_ids {
            match self.get(room_id).await {
                Ok(room) => rooms.push(room),
                Err(AppError::NotFound(_)) => {
                    debug!(user_id = user_id, room_id = room_id, "Dropping stale room index entry");
                    soft_write("user_rooms", self.cache.srem(&index_key, room_id).await);
                }
                Err(e) => return Err(e),
            }
        }

        let mut ranked = self.activity_scores(&rooms).await?;
        ranked.sort_by(|(a, sa), (b, sb)| match (sa, sb) {
            (Some(x), Some(y)) => y.total_cmp(x).then(a.id.cmp(&b.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });

        let mut summaries = Vec::with_capacity(ranked.len());
        for (room, _) in ranked {
            summaries.push(self.summarize(room).await?);
        }
        Ok(summaries)
    }

    /// Pair each room with its activity score, repairing scores the cache
    /// lacks from the durable store.
    async fn activity_scores(&self, rooms: &[Room]) -> Result<Vec<(Room, Option<f64>)>, AppError> {
        let mut scored = Vec::with_capacity(rooms.len());
        let mut missing = Vec::new();

        for room in rooms {
            let score = soft_read(
                "room_activity",
                self.cache
                    .zscore(keys::ROOM_ACTIVITY, &room.id.to_string())
                    .await,
            )
            .flatten();
            if score.is_none() {
                missing.push(room.id);
            }
            scored.push((room.clone(), score));
        }

        if missing.is_empty() {
            return Ok(scored);
        }

        metrics::record_cache_fallback("room_activity");
        let repaired = self.messages.last_activity(&missing).await?;
        for (room_id, last_sent_at) in repaired {
            let score = last_sent_at.timestamp_millis() as f64;
            soft_write(
                "room_activity",
                self.cache
                    .zadd(keys::ROOM_ACTIVITY, &room_id.to_string(), score)
                    .await,
            );
            if let Some(entry) = scored.iter_mut().find(|(room, _)| room.id == room_id) {
                entry.1 = Some(score);
            }
        }

        Ok(scored)
    }

    async fn cache_room(&self, room: &Room) {
        let Some(json) = soft_write("room_put", serde_json::to_string(room).map_err(AppError::from))
        else {
            return;
        };
        soft_write(
            "room_put",
            self.cache
                .hset(keys::ROOMS, &room.id.to_string(), &json)
                .await,
        );
    }
}

fn not_found(room_id: i64) -> AppError {
    AppError::NotFound(format!("Room {} not found", room_id))
}
