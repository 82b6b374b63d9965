//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure. Every test app runs on
//! the in-memory durable store and cache, with three known users.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chat_core::application::ChatService;
use chat_core::config::Settings;
use chat_core::domain::{Room, Topic, UserProfile};
use chat_core::infrastructure::cache::{FastCache, InMemoryCache};
use chat_core::infrastructure::identity::{Claims, InMemoryUserDirectory};
use chat_core::infrastructure::repositories::InMemoryStore;
use chat_core::shared::error::AppError;
use chat_core::startup::{build_router, AppState, Backends};

pub const JWT_SECRET: &str = "integration-test-secret-with-32-plus-chars";

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;

/// Test application over in-memory backends
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryCache>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Test app whose cache stalls on every message-log command, widening
    /// the window between a writer's read and its write.
    pub fn with_cache_latency(latency: Duration) -> Self {
        Self::build(Some(latency))
    }

    fn build(latency: Option<Duration>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        for (id, name) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol")] {
            users.insert(UserProfile {
                id,
                name: name.to_string(),
                avatar: None,
            });
        }

        let mut backends = Backends::in_memory(store.clone(), cache.clone(), users);
        if let Some(latency) = latency {
            backends.cache = Arc::new(SlowCache {
                inner: cache.clone(),
                latency,
            });
        }
        let state = AppState::new(Settings::in_memory(JWT_SECRET), backends);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            cache,
        }
    }

    pub fn chat(&self) -> &ChatService {
        &self.state.chat
    }

    /// Create a room with the given members
    pub async fn room_with(&self, name: &str, members: &[i64]) -> Room {
        let room = self.chat().create_room(name).await.unwrap();
        for user_id in members {
            self.chat().add_member(room.id, *user_id).await.unwrap();
        }
        room
    }

    /// Register a gateway connection subscribed to `topics`
    pub fn subscriber(&self, user_id: i64, topics: &[Topic]) -> Subscriber {
        let (tx, rx) = mpsc::channel(64);
        let connection_id = self.state.gateway.register(user_id, tx);
        for topic in topics {
            self.state.gateway.subscribe(connection_id, *topic);
        }
        Subscriber { rx }
    }

    /// Send a request through the router
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, Some(token), None).await
    }
}

/// Cache that sleeps before each command on a room's message log
struct SlowCache {
    inner: Arc<InMemoryCache>,
    latency: Duration,
}

impl SlowCache {
    async fn stall(&self, key: &str) {
        if key.ends_with(":messages") {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl FastCache for SlowCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, AppError> {
        for key in keys {
            self.stall(key).await;
        }
        self.inner.delete(keys).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        self.inner.hget(key, field).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        self.inner.hset(key, field, value).await
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, AppError> {
        self.inner.hdel(key, field).await
    }

    async fn sadd(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<i64>, AppError> {
        self.inner.smembers(key).await
    }

    async fn sismember(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.inner.sismember(key, member).await
    }

    async fn scard(&self, key: &str) -> Result<u64, AppError> {
        self.inner.scard(key).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, AppError> {
        self.stall(key).await;
        self.inner.zadd(key, member, score).await
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64, AppError> {
        self.stall(key).await;
        self.inner.zrem(key, members).await
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, AppError> {
        self.inner.zscore(key, member).await
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, AppError> {
        self.stall(key).await;
        self.inner.zrange(key, start, stop).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, AppError> {
        self.stall(key).await;
        self.inner.zrange_by_score(key, min, max).await
    }

    async fn flush(&self) -> Result<(), AppError> {
        self.inner.flush().await
    }
}

/// Receiving end of a test gateway connection
pub struct Subscriber {
    rx: mpsc::Receiver<String>,
}

impl Subscriber {
    /// All frames queued so far
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    /// Names of the events queued so far
    pub fn event_names(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|frame| frame["payload"]["event"].as_str().map(str::to_string))
            .collect()
    }
}

/// Signed bearer token for `user_id`
pub fn token_for(user_id: i64) -> String {
    token_with(user_id.to_string(), Utc::now().timestamp() + 3600)
}

/// Token that expired an hour ago
pub fn expired_token(user_id: i64) -> String {
    token_with(user_id.to_string(), Utc::now().timestamp() - 3600)
}

fn token_with(sub: String, exp: i64) -> String {
    encode(
        &Header::default(),
        &Claims { sub, exp },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
