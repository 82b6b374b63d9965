//! # Domain Entities
//!
//! Core domain entities of the chat engine. Each entity maps to its
//! corresponding durable table.
//!
//! - **Room**: a named channel with members and an ordered message log
//! - **Membership**: a user's membership in a room
//! - **Message**: one entry of a room's log, with its read state
//! - **UserProfile**: identity data owned by the account service
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod membership;
mod message;
mod room;
mod user;

pub use membership::{Membership, MembershipRepository};
pub use message::{Message, MessageRepository, MessageType, NewMessage};
pub use room::{Room, RoomRepository, RoomSummary};
pub use user::{IdentityService, UserDirectory, UserProfile};
