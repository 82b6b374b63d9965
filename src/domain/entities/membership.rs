//! Room membership entity and repository trait.
//!
//! Maps to the `room_members` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A user's membership in a room.
///
/// Maps to the `room_members` table:
/// - room_id: BIGINT NOT NULL (composite PK)
/// - user_id: BIGINT NOT NULL (composite PK)
/// - joined_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// The composite key guarantees at most one row per (user, room) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub room_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(room_id: i64, user_id: i64) -> Self {
        Self {
            room_id,
            user_id,
            joined_at: Utc::now(),
        }
    }
}

/// Repository trait for Membership data access operations.
///
/// Add and remove are idempotent: the boolean result reports whether a row
/// actually changed, never an error for a no-op.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert the pair if absent. Returns true if a row was inserted.
    async fn add(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Delete the pair if present. Returns true if a row was deleted.
    async fn remove(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Check whether the pair exists.
    async fn exists(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Ids of all rooms the user belongs to.
    async fn find_room_ids_by_user(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Ids of all members of a room, ascending.
    async fn find_user_ids_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError>;

    /// Delete every membership of a room, returning the removed user ids.
    async fn delete_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError>;
}
