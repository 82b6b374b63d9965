//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// Durable store / fast cache backend selection
    pub storage: StorageSettings,

    /// Fan-out configuration
    pub broadcast: BroadcastSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Prefix prepended to every cache key (empty for none)
    #[serde(default)]
    pub key_prefix: String,
}

/// JWT verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared HS256 secret used by the account service to sign tokens
    pub secret: String,
}

/// Which durable store and fast cache the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL + Redis
    Postgres,
    /// Process-local store and cache, for development and tests
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

/// Fan-out configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastSettings {
    /// Capacity of each subscriber's outbound queue; events beyond it are dropped
    pub subscriber_queue_capacity: usize,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "postgres://localhost/chat")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.key_prefix", "")?
            .set_default("storage.backend", "postgres")?
            .set_default("broadcast.subscriber_queue_capacity", 256_i64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("storage.backend", std::env::var("STORAGE_BACKEND").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.broadcast.subscriber_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "broadcast.subscriber_queue_capacity must be positive".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Settings for running entirely in-process, used by tests and local development.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".into(),
                port: 0,
            },
            database: DatabaseSettings {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout: 5,
            },
            redis: RedisSettings {
                url: String::new(),
                key_prefix: String::new(),
            },
            jwt: JwtSettings {
                secret: jwt_secret.into(),
            },
            storage: StorageSettings {
                backend: StorageBackend::Memory,
            },
            broadcast: BroadcastSettings {
                subscriber_queue_capacity: 64,
            },
            cors: CorsSettings {
                allowed_origins: vec!["http://localhost:3000".into()],
            },
            websocket: WebSocketSettings {
                max_message_size: 65536,
            },
            environment: "test".into(),
        }
    }
}

impl RedisSettings {
    /// Key prefix, if one is configured.
    pub fn prefix(&self) -> Option<&str> {
        let prefix = self.key_prefix.trim();
        (!prefix.is_empty()).then_some(prefix)
    }
}
