//! Cache Service
//!
//! The `FastCache` trait over the string, hash, set and sorted-set primitives
//! the engine mirrors its state into, and its Redis implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_core::infrastructure::cache::{keys, FastCache, RedisCache};
//!
//! let cache = RedisCache::new(redis_connection);
//!
//! cache.sadd(&keys::room_users(7), 42).await?;
//! let members = cache.smembers(&keys::room_users(7)).await?;
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::shared::error::AppError;

/// Fast-path cache abstraction.
///
/// The cache is soft state: every value it holds can be rebuilt from the
/// durable store. Object-safe so services can hold an `Arc<dyn FastCache>`.
///
/// All operations are async and return `Result<T, AppError>`; failures map to
/// `AppError::Cache`.
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Reads a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Writes a string value without expiration.
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Deletes keys of any type. Returns the number of keys removed.
    async fn delete(&self, keys: &[String]) -> Result<u64, AppError>;

    /// Reads a hash field.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, AppError>;

    /// Writes a hash field.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), AppError>;

    /// Deletes a hash field. Returns true if it existed.
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, AppError>;

    /// Adds an id to a set. Returns true if it was not already present.
    async fn sadd(&self, key: &str, member: i64) -> Result<bool, AppError>;

    /// Removes an id from a set. Returns true if it was present.
    async fn srem(&self, key: &str, member: i64) -> Result<bool, AppError>;

    /// All ids of a set (empty if the key is absent).
    async fn smembers(&self, key: &str) -> Result<Vec<i64>, AppError>;

    /// Set membership test.
    async fn sismember(&self, key: &str, member: i64) -> Result<bool, AppError>;

    /// Set cardinality.
    async fn scard(&self, key: &str) -> Result<u64, AppError>;

    /// Adds or re-scores a sorted-set member. Returns true if it was new.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, AppError>;

    /// Removes sorted-set members. Returns the number removed.
    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64, AppError>;

    /// Score of a sorted-set member.
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, AppError>;

    /// Members by rank, `start..=stop`, ascending. Negative indices count from the end.
    async fn zrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, AppError>;

    /// Members with `min <= score <= max`, ascending.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<Vec<String>, AppError>;

    /// Drops every key owned by this cache.
    async fn flush(&self) -> Result<(), AppError>;
}

/// Redis-backed cache implementation.
///
/// Uses a Redis ConnectionManager for efficient connection pooling and
/// automatic reconnection handling.
#[derive(Clone)]
pub struct RedisCache {
    /// Redis connection manager with automatic reconnection
    conn: ConnectionManager,
    /// Optional key prefix for namespacing
    prefix: Option<Arc<str>>,
}

impl RedisCache {
    /// Creates a new RedisCache instance.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: None }
    }

    /// Creates a new RedisCache instance with a key prefix.
    ///
    /// ```rust,ignore
    /// let cache = RedisCache::with_prefix(conn, "chat:v1:");
    /// // key "room:7:users" becomes "chat:v1:room:7:users"
    /// ```
    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
        }
    }

    /// Formats a key with the optional prefix.
    fn format_key(&self, key: &str) -> String {
        format_key(self.prefix.as_deref(), key)
    }
}

fn format_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl FastCache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let result: Option<String> = conn.get(&full_key).await?;
        debug!(key = %full_key, hit = result.is_some(), "Cache get");

        Ok(result)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let _: () = conn.set(&full_key, value).await?;
        debug!(key = %full_key, "Cache set");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, keys: &[String]) -> Result<u64, AppError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.format_key(k)).collect();
        let mut conn = self.conn.clone();

        let deleted: u64 = conn.del(full_keys.as_slice()).await?;
        debug!(count = deleted, "Cache delete");

        Ok(deleted)
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let result: Option<String> = conn.hget(&full_key, field).await?;
        debug!(key = %full_key, field = field, hit = result.is_some(), "Cache hget");

        Ok(result)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let _: u64 = conn.hset(&full_key, field, value).await?;
        debug!(key = %full_key, field = field, "Cache hset");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let removed: u64 = conn.hdel(&full_key, field).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn sadd(&self, key: &str, member: i64) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let added: u64 = conn.sadd(&full_key, member).await?;
        Ok(added > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn srem(&self, key: &str, member: i64) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let removed: u64 = conn.srem(&full_key, member).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn smembers(&self, key: &str) -> Result<Vec<i64>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let members: Vec<i64> = conn.smembers(&full_key).await?;
        debug!(key = %full_key, count = members.len(), "Cache smembers");

        Ok(members)
    }

    #[instrument(skip(self), level = "debug")]
    async fn sismember(&self, key: &str, member: i64) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let is_member: bool = conn.sismember(&full_key, member).await?;
        Ok(is_member)
    }

    #[instrument(skip(self), level = "debug")]
    async fn scard(&self, key: &str) -> Result<u64, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let count: u64 = conn.scard(&full_key).await?;
        Ok(count)
    }

    #[instrument(skip(self, member), level = "debug")]
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let added: u64 = conn.zadd(&full_key, member, score).await?;
        debug!(key = %full_key, score = score, added = added > 0, "Cache zadd");

        Ok(added > 0)
    }

    #[instrument(skip(self, members), level = "debug")]
    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64, AppError> {
        if members.is_empty() {
            return Ok(0);
        }

        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let removed: u64 = conn.zrem(&full_key, members).await?;
        debug!(key = %full_key, count = removed, "Cache zrem");

        Ok(removed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let score: Option<f64> = conn.zscore(&full_key, member).await?;
        Ok(score)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let members: Vec<String> = conn.zrange(&full_key, start, stop).await?;
        debug!(key = %full_key, count = members.len(), "Cache zrange");

        Ok(members)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&full_key)
            .arg(min)
            .arg(max)
            .query_async(&mut conn)
            .await?;

        Ok(members)
    }

    #[instrument(skip(self), level = "debug")]
    async fn flush(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();

        match &self.prefix {
            // Only this cache's namespace is dropped when sharing a database
            Some(prefix) => {
                let pattern = format!("{}*", prefix);
                let keys: Vec<String> = redis::cmd("KEYS")
                    .arg(&pattern)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    let _: u64 = conn.del(keys.as_slice()).await?;
                }
                debug!(pattern = %pattern, count = keys.len(), "Cache flush");
            }
            None => {
                let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
                debug!("Cache flush (database)");
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
