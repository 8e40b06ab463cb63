//! Main HTTP/WebSocket server and its shared state.

use anyhow::Result;
use axum::{Router, routing::get};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use worldsync_core::{WorldError, WorldStore};

use crate::control_ui;
use crate::health_api;
use crate::http_api;
use crate::session_registry::{ClientRegistry, Session};
use crate::ws_server;

/// Application state shared across routes and sessions.
///
/// Every field is a cheap handle; cloning shares the same store and registry.
#[derive(Clone)]
pub struct GatewayState {
    pub store: WorldStore,
    pub registry: ClientRegistry,
    pub started_at: DateTime<Utc>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayState {
    pub fn new() -> Self {
        Self::with_store(WorldStore::new())
    }

    pub fn with_store(store: WorldStore) -> Self {
        Self {
            store,
            registry: ClientRegistry::new(),
            started_at: Utc::now(),
        }
    }

    /// Join the registry with the current world snapshot queued first.
    pub async fn open_session(&self) -> Result<Session, WorldError> {
        self.registry.join_with_snapshot(&self.store).await
    }
}

/// Build the router with every route.
pub fn build_router(state: GatewayState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(control_ui::index))
        .route(
            "/entity/:entity",
            get(http_api::get_entity)
                .put(http_api::put_entity)
                .post(http_api::post_entity),
        )
        .route("/world", get(http_api::get_world).post(http_api::get_world))
        .route("/clear", get(http_api::clear_world).post(http_api::clear_world))
        .route("/subscribe", get(ws_server::ws_handler))
        .route("/api/health", get(health_api::get_health))
        .nest_service("/static", control_ui::static_files(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
#[instrument(skip(state))]
pub async fn start_server(addr: &str, state: GatewayState, static_dir: &Path) -> Result<()> {
    let app = build_router(state, static_dir);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, static_dir = %static_dir.display(), "worldsync listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
