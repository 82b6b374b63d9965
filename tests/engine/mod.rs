//! Engine Tests
//!
//! Behavior of the chat engine over the in-memory backends.

mod cache_tests;
mod dispatch_tests;
