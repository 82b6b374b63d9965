//! API Tests

mod health_tests;
mod message_api_tests;
mod room_api_tests;
