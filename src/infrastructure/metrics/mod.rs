//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Messages appended to room logs, by type
//! - Cache read fallbacks to the durable store, by operation
//! - Swallowed cache write failures, by operation
//! - Broadcast deliveries, by outcome (delivered, dropped, closed)
//! - Active WebSocket connections

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Messages appended to a room log
pub static MESSAGES_APPENDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_appended_total", "Messages appended to room logs")
            .namespace("chat_core"),
        &["type"],
    )
    .expect("Failed to create MESSAGES_APPENDED_TOTAL metric")
});

/// Reads served by the durable store because the cache missed or failed
pub static CACHE_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cache_fallbacks_total",
            "Reads that fell back to the durable store",
        )
        .namespace("chat_core"),
        &["operation"],
    )
    .expect("Failed to create CACHE_FALLBACKS_TOTAL metric")
});

/// Cache writes that failed and were logged
pub static CACHE_WRITE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cache_write_failures_total", "Swallowed cache write failures")
            .namespace("chat_core"),
        &["operation"],
    )
    .expect("Failed to create CACHE_WRITE_FAILURES_TOTAL metric")
});

/// Per-subscriber broadcast outcomes
pub static BROADCAST_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("broadcast_deliveries_total", "Per-subscriber broadcast outcomes")
            .namespace("chat_core"),
        &["outcome"], // "delivered", "dropped", "closed"
    )
    .expect("Failed to create BROADCAST_DELIVERIES_TOTAL metric")
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("chat_core"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(MESSAGES_APPENDED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_APPENDED_TOTAL");
    registry
        .register(Box::new(CACHE_FALLBACKS_TOTAL.clone()))
        .expect("Failed to register CACHE_FALLBACKS_TOTAL");
    registry
        .register(Box::new(CACHE_WRITE_FAILURES_TOTAL.clone()))
        .expect("Failed to register CACHE_WRITE_FAILURES_TOTAL");
    registry
        .register(Box::new(BROADCAST_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register BROADCAST_DELIVERIES_TOTAL");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to count an appended message
pub fn record_message_appended(message_type: &str) {
    MESSAGES_APPENDED_TOTAL
        .with_label_values(&[message_type])
        .inc();
}

/// Helper to count a read served by the durable store
pub fn record_cache_fallback(operation: &str) {
    CACHE_FALLBACKS_TOTAL.with_label_values(&[operation]).inc();
}

/// Helper to count a swallowed cache write failure
pub fn record_cache_write_failure(operation: &str) {
    CACHE_WRITE_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Helper to count broadcast outcomes
pub fn record_broadcast(outcome: &str, count: u64) {
    if count > 0 {
        BROADCAST_DELIVERIES_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count);
    }
}

/// Helper to update the WebSocket connection count
pub fn set_websocket_connections(connected: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(connected as i64);
}
