//! # Chat Core
//!
//! Server entry point. Initializes tracing, loads configuration, connects
//! the configured storage backend and serves HTTP and WebSocket traffic.

use anyhow::Result;
use tracing::info;

use chat_core::config::Settings;
use chat_core::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    chat_core::telemetry::init_tracing();

    info!("Starting chat core...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        storage = ?settings.storage.backend,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
