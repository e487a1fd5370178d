//! # Messenger Server
//!
//! Application entry point. Initializes tracing, loads configuration and
//! runs the HTTP / live connection server until Ctrl-C.

use anyhow::Result;
use tracing::info;

use messenger_server::config::Settings;
use messenger_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    messenger_server::telemetry::init_tracing();

    info!("Starting Messenger Server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
