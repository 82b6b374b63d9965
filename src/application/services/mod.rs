//! Application Services
//!
//! Services that coordinate the durable store, the fast cache and the
//! fan-out publisher.
//!
//! ## Available Services
//!
//! - **RoomDirectory**: room identity, membership and room lists
//! - **MessageLog**: per-room ordered message log
//! - **ReadTracker**: read marks and read counts
//! - **EventDispatcher**: inbound client events, one handler per type
//! - **ChatService**: the facade used by the HTTP and WebSocket layers

mod cache_policy;
pub mod chat_service;
pub mod event_dispatcher;
pub mod message_log;
pub mod read_tracker;
pub mod room_directory;

pub use chat_service::{ChatService, Repositories, MAX_PAGE_SIZE};
pub use event_dispatcher::EventDispatcher;
pub use message_log::MessageLog;
pub use read_tracker::ReadTracker;
pub use room_directory::RoomDirectory;
