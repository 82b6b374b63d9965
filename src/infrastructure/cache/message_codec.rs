//! Encoding of messages as members of a room's cache-side log.
//!
//! A member is `"{id:020}:{json}"`. The zero-padded durable id makes members
//! that share a score sort by id, and lets every copy of a message be found
//! by prefix when its read state is rewritten.

use crate::domain::Message;
use crate::shared::error::AppError;

const ID_WIDTH: usize = 20;

/// Prefix shared by every cache member of the message with this id.
#[inline]
pub fn id_prefix(message_id: i64) -> String {
    format!("{:0width$}:", message_id, width = ID_WIDTH)
}

/// Serialize a message into its log member.
pub fn encode(message: &Message) -> Result<String, AppError> {
    let json = serde_json::to_string(message)?;
    Ok(format!("{}{}", id_prefix(message.id), json))
}

/// Parse a log member. Corrupt members fail with `AppError::Serialization`.
pub fn decode(member: &str) -> Result<Message, AppError> {
    let (_, json) = member
        .split_once(':')
        .ok_or_else(|| AppError::Serialization("cache member without id prefix".into()))?;
    let message: Message = serde_json::from_str(json)?;
    if !member.starts_with(&id_prefix(message.id)) {
        return Err(AppError::Serialization(format!(
            "cache member prefix does not match message {}",
            message.id
        )));
    }
    Ok(message)
}

/// Whether `member` encodes the message with this id.
#[inline]
pub fn is_member_of(member: &str, message_id: i64) -> bool {
    member.starts_with(&id_prefix(message_id))
}
