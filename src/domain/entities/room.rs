//! Room entity and repository trait.
//!
//! Maps to the `chat_rooms` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserProfile;
use crate::shared::error::AppError;

/// A named channel grouping a set of member users and an ordered message log.
///
/// Maps to the `chat_rooms` table:
/// - id: BIGSERIAL PRIMARY KEY (assigned by the durable store)
/// - name: VARCHAR(100) NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// A room with no members may still exist; nothing cascades on membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Durable id (immutable once assigned)
    pub id: i64,

    /// Display name
    pub name: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// One entry of a user's room list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: Room,

    /// Content of the most recent message, if any
    pub latest_message: Option<String>,

    /// Profiles of the current members
    pub members: Vec<UserProfile>,
}

/// Repository trait for Room data access operations.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Create a room; the store assigns its id.
    async fn create(&self, name: &str) -> Result<Room, AppError>;

    /// Find a room by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError>;

    /// Delete the room row. Returns false if no such row existed.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}
