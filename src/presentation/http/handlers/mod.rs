//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod admin;
pub mod health;
pub mod messages;
pub mod rooms;
pub mod users;
