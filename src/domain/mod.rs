//! # Domain Layer
//!
//! Entities, events and the collaborator traits of the chat engine.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Room, Membership, Message, UserProfile and their repositories
//! - **events**: inbound client events, outbound server events and topics

pub mod entities;
pub mod events;

// Re-export commonly used types
pub use entities::*;
pub use events::*;
