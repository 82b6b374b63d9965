//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Durable store repositories (PostgreSQL, in-memory)
//! - Fast cache implementations (Redis, in-memory)
//! - Identity (JWT verification, user directory)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod identity;
pub mod metrics;
pub mod repositories;
