//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::MessageType;

/// Create room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

/// Add member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(range(min = 1, message = "User id must be positive"))]
    pub user_id: i64,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// One of `ENTER`, `TALK`, `EXIT`, `MATCH_REQUEST`, `MATCH`
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,

    #[validate(length(max = 2000, message = "Content must be at most 2000 characters"))]
    #[serde(default)]
    pub content: String,
}

fn default_message_type() -> String {
    MessageType::Talk.as_str().to_string()
}

/// Message page query (`?page=0&size=20`)
#[derive(Debug, Deserialize, Validate)]
pub struct MessagePageQuery {
    #[validate(range(min = 0, message = "Page must not be negative"))]
    #[serde(default)]
    pub page: i64,

    #[validate(range(min = 1, max = 100, message = "Size must be 1-100"))]
    #[serde(default = "default_page_size")]
    pub size: i64,
}

fn default_page_size() -> i64 {
    20
}
