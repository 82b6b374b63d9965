//! Repository Implementations
//!
//! Implementations of the domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgRoomRepository** - rooms (`chat_rooms`)
//! - **PgMembershipRepository** - room memberships (`room_members`)
//! - **PgMessageRepository** - message log and read marks (`messages`, `message_reads`)
//! - **PgUserDirectory** - read-only profile lookups (`users`)
//! - **InMemoryStore** - process-local store implementing the room,
//!   membership and message repositories
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{
//!     PgMembershipRepository, PgMessageRepository, PgRoomRepository,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let rooms = PgRoomRepository::new(pool.clone());
//!     let memberships = PgMembershipRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool.clone());
//! }
//! ```

pub mod membership_repository;
pub mod memory_store;
pub mod message_repository;
pub mod room_repository;
pub mod user_repository;

pub use membership_repository::PgMembershipRepository;
pub use memory_store::InMemoryStore;
pub use message_repository::PgMessageRepository;
pub use room_repository::PgRoomRepository;
pub use user_repository::PgUserDirectory;
