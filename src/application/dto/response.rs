//! Response DTOs
//!
//! Response bodies that are not plain domain types.

use serde::Serialize;

/// Read count of a room
#[derive(Debug, Serialize)]
pub struct ReadCountResponse {
    pub room_id: i64,
    pub read_count: i64,
}

/// Result of an idempotent membership change
#[derive(Debug, Serialize)]
pub struct MemberChangeResponse {
    pub room_id: i64,
    pub user_id: i64,
    /// False when the call was a no-op
    pub changed: bool,
}

/// Result of a cache log rebuild
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub room_id: i64,
    pub messages: usize,
}
