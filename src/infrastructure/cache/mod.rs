//! Cache Module
//!
//! The fast-path cache the engine mirrors room, message, activity and
//! read-receipt state into.
//!
//! This module provides:
//! - A `FastCache` trait over string, hash, set and sorted-set primitives
//! - A `RedisCache` implementation with automatic reconnection
//! - An `InMemoryCache` implementation for the `memory` backend and tests
//! - The key layout and the encoding of cached log entries
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |    Services       |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |  FastCache Trait  |  <-- Abstract interface
//! +-------------------+
//!      |         |
//!      v         v
//! +---------+ +---------------+
//! | Redis   | | InMemoryCache |
//! +---------+ +---------------+
//! ```

mod cache_service;
mod memory_cache;
pub mod message_codec;

pub use cache_service::{FastCache, RedisCache};
pub use memory_cache::InMemoryCache;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Creates a `RedisCache` from configuration, applying the key prefix if set.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_cache(settings: &RedisSettings) -> Result<RedisCache, redis::RedisError> {
    let conn = create_redis_client(settings).await?;
    Ok(match settings.prefix() {
        Some(prefix) => RedisCache::with_prefix(conn, prefix),
        None => RedisCache::new(conn),
    })
}

/// Cache key layout.
///
/// | key                       | type       | content                        |
/// |---------------------------|------------|--------------------------------|
/// | `rooms`                   | hash       | room id -> Room JSON           |
/// | `rooms:deleted`           | set        | tombstoned room ids            |
/// | `user:{id}:rooms`         | set        | room ids of a user             |
/// | `room:{id}:users`         | set        | member ids of a room           |
/// | `room:{id}:messages`      | sorted set | log members, score = sentAt ms |
/// | `room:{id}:latestMessage` | string     | latest message content         |
/// | `room:activity`           | sorted set | room id, score = sentAt ms     |
/// | `room:{id}:readUsers`     | set        | users with any read mark       |
pub mod keys {
    /// Hash of all cached rooms, keyed by room id
    pub const ROOMS: &str = "rooms";

    /// Set of room ids whose deletion has started
    pub const DELETED_ROOMS: &str = "rooms:deleted";

    /// Sorted set ranking rooms by last activity
    pub const ROOM_ACTIVITY: &str = "room:activity";

    /// Prefix for per-user keys (e.g., "user:7:rooms")
    pub const USER: &str = "user:";

    /// Prefix for per-room keys (e.g., "room:3:messages")
    pub const ROOM: &str = "room:";

    /// Generates the room-index key of a user
    #[inline]
    pub fn user_rooms(user_id: impl std::fmt::Display) -> String {
        format!("{}{}:rooms", USER, user_id)
    }

    /// Generates the member-index key of a room
    #[inline]
    pub fn room_users(room_id: impl std::fmt::Display) -> String {
        format!("{}{}:users", ROOM, room_id)
    }

    /// Generates the message log key of a room
    #[inline]
    pub fn room_messages(room_id: impl std::fmt::Display) -> String {
        format!("{}{}:messages", ROOM, room_id)
    }

    /// Generates the latest-message snippet key of a room
    #[inline]
    pub fn room_latest_message(room_id: impl std::fmt::Display) -> String {
        format!("{}{}:latestMessage", ROOM, room_id)
    }

    /// Generates the read-users key of a room
    #[inline]
    pub fn room_read_users(room_id: impl std::fmt::Display) -> String {
        format!("{}{}:readUsers", ROOM, room_id)
    }
}
