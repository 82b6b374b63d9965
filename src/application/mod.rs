//! Application Layer
//!
//! The chat engine's services and the DTOs of its HTTP surface. This layer
//! orchestrates the flow of data between the presentation and domain layers.

pub mod dto;
pub mod services;

pub use services::ChatService;
