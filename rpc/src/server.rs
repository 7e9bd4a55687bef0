//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use cohort_groups::GroupRegistry;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Shared state for every handler.
pub struct RpcState {
    pub registry: GroupRegistry,
    /// Exposed on `/metrics` when set.
    pub metrics: Option<prometheus::Registry>,
}

impl RpcState {
    pub fn new(registry: GroupRegistry, metrics: Option<prometheus::Registry>) -> Self {
        Self { registry, metrics }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route(
            "/groups",
            get(handlers::list_groups).post(handlers::create_group),
        )
        .route(
            "/groups/:name",
            get(handlers::get_group).put(handlers::update_group),
        )
        .route("/groups/:name/members", post(handlers::add_member))
        .route("/groups/:name/members/:commitment", get(handlers::is_member))
        .route(
            "/groups/:name/members/:commitment/proof",
            get(handlers::generate_proof),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: Arc<RpcState>,
}

impl RpcServer {
    pub fn new(port: u16, state: RpcState) -> Self {
        Self {
            port,
            state: Arc::new(state),
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(Arc::clone(&self.state));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        info!("RPC server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!("RPC server stopped");
        Ok(())
    }
}
