//! Presentation Layer
//!
//! HTTP routes and the WebSocket connection layer.

pub mod http;
pub mod middleware;
pub mod websocket;
