//! HTTP and WebSocket surface of the recorder.
//!
//! Provides endpoints for:
//! - The backend control channel (WebSocket and single-shot HTTP)
//! - Session introspection

pub mod error;
pub mod link;
pub mod routes;

use crate::config::ServerConfig;
use crate::session::RegistryHandle;
use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

pub use link::BackendLink;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub link: BackendLink,
}

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: &ServerConfig, registry: RegistryHandle, link: BackendLink) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state: AppState { registry, link },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(status))
            .with_state(self.state.clone())
            .merge(routes::control::router(self.state.clone()))
            .merge(routes::sessions::router(self.state.clone()))
            .layer(ServiceBuilder::new())
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) -> Result<()> {
        let app = self.router();
        let address = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&address).await?;

        info!("API server listening on http://{}", address);
        info!("Endpoints:");
        info!("  GET  /          - Service info");
        info!("  GET  /ws        - Backend control channel (WebSocket)");
        info!("  POST /command   - Submit one command");
        info!("  GET  /sessions  - List active sessions");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "cliprec",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "backend_connected": state.link.is_connected(),
    }))
}
