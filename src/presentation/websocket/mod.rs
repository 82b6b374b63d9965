//! WebSocket Gateway
//!
//! Real-time delivery to connected clients.

pub mod gateway;
pub mod handler;
pub mod messages;

pub use gateway::Gateway;
pub use handler::ws_handler;
pub use messages::{ClientFrame, ServerFrame};
