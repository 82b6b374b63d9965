//! Application Startup
//!
//! Backend selection, state wiring and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use crate::application::services::{ChatService, Repositories};
use crate::config::{Settings, StorageBackend};
use crate::domain::{IdentityService, UserDirectory};
use crate::infrastructure::cache::{self, FastCache, InMemoryCache};
use crate::infrastructure::database;
use crate::infrastructure::identity::{InMemoryUserDirectory, JwtIdentityService};
use crate::infrastructure::repositories::{
    InMemoryStore, PgMembershipRepository, PgMessageRepository, PgRoomRepository,
    PgUserDirectory,
};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Gateway;

/// Storage collaborators the engine runs on
pub struct Backends {
    pub repositories: Repositories,
    pub cache: Arc<dyn FastCache>,
    pub users: Arc<dyn UserDirectory>,
}

impl Backends {
    /// Connect the backends named by `settings.storage.backend`.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        match settings.storage.backend {
            StorageBackend::Postgres => {
                let pool = database::create_pool(&settings.database)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                database::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;
                tracing::info!("Database connection pool created");

                let cache = cache::create_redis_cache(&settings.redis)
                    .await
                    .context("failed to connect to Redis")?;

                Ok(Self {
                    repositories: Repositories {
                        rooms: Arc::new(PgRoomRepository::new(pool.clone())),
                        memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
                        messages: Arc::new(PgMessageRepository::new(pool.clone())),
                    },
                    cache: Arc::new(cache),
                    users: Arc::new(PgUserDirectory::new(pool)),
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("Running on the in-memory store; state is lost on exit");
                Ok(Self::in_memory(
                    Arc::new(InMemoryStore::new()),
                    Arc::new(InMemoryCache::new()),
                    Arc::new(InMemoryUserDirectory::new()),
                ))
            }
        }
    }

    /// Process-local backends sharing one store.
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        users: Arc<InMemoryUserDirectory>,
    ) -> Self {
        Self {
            repositories: Repositories {
                rooms: store.clone(),
                memberships: store.clone(),
                messages: store,
            },
            cache,
            users,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub gateway: Arc<Gateway>,
    pub identity: Arc<dyn IdentityService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings, backends: Backends) -> Self {
        let identity: Arc<dyn IdentityService> =
            Arc::new(JwtIdentityService::new(&settings.jwt.secret, backends.users));
        let gateway = Arc::new(Gateway::new(settings.broadcast.subscriber_queue_capacity));
        let chat = Arc::new(ChatService::new(
            backends.repositories,
            backends.cache,
            identity.clone(),
            gateway.clone(),
        ));

        Self {
            chat,
            gateway,
            identity,
            settings: Arc::new(settings),
        }
    }
}

/// Router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors_layer)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        let backends = Backends::connect(&settings).await?;
        let addr: SocketAddr = settings
            .server_addr()
            .parse()
            .context("invalid server address")?;

        let router = build_router(AppState::new(settings, backends));

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
