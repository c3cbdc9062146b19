//! StatusTrail - vendor status monitoring.
//!
//! Checks each configured vendor status page on an interval and serves the
//! normalized results as a dashboard and JSON API.

use statustrail::config::{load_sources, ServerConfig};
use statustrail::db::Store;
use statustrail::scheduler::Scheduler;
use statustrail::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("statustrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting StatusTrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    let sources = load_sources(cfg.sources_path.as_deref())?;
    match &cfg.sources_path {
        Some(path) => tracing::info!("Loaded {} sources from {}", sources.len(), path.display()),
        None => tracing::info!("Loaded {} built-in sources", sources.len()),
    }

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Start scheduler
    let scheduler = Arc::new(Scheduler::new(store.clone(), sources, &cfg)?);
    scheduler.start();

    // Start web server
    let server = Server::new(cfg, store, scheduler);
    server.start().await?;

    Ok(())
}
