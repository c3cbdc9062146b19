//! Web server module.

mod handlers;
mod summary;

pub use handlers::*;
pub use summary::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::Scheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
}

/// Web server for StatusTrail.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                scheduler,
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // API endpoints
            .route("/health", get(handlers::handle_health))
            .route("/health/detailed", get(handlers::handle_health_detailed))
            .route("/health/check", post(handlers::handle_check_now))
            .route("/api/sources", get(handlers::handle_sources))
            // Static assets
            .route("/static/{*path}", get(handlers::handle_static))
            .route("/favicon.ico", get(handlers::handle_favicon))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
