//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{AddMemberRequest, CreateRoomRequest, MessagePageQuery, SendMessageRequest};
pub use response::{MemberChangeResponse, ReadCountResponse, RebuildResponse};
