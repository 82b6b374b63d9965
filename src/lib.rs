//! # Chat Core
//!
//! Real-time messaging and room-state engine for a chat backend:
//! - Per-room ordered message logs with read receipts
//! - Room directory with membership and activity-ranked room lists
//! - A fast cache kept in front of a durable store, repaired on read
//! - Live fan-out of events to WebSocket subscribers
//!
//! ## Architecture
//!
//! - **Domain Layer**: entities, event types and collaborator traits
//! - **Application Layer**: services coordinating store, cache and fan-out
//! - **Infrastructure Layer**: PostgreSQL, Redis, in-memory backends, JWT identity, metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! chat_core/
//! +-- config/         Configuration management
//! +-- domain/         Entities, events and collaborator traits
//! +-- application/    Services and request/response DTOs
//! +-- infrastructure/ Stores, caches, identity and metrics
//! +-- presentation/   HTTP routes and WebSocket gateway
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
