//! Admin HTTP server.
//!
//! # Responsibilities
//! - Create the axum router with all handlers
//! - Wire up middleware (request id, tracing, timeout)
//! - Serve until the shutdown coordinator fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AdminConfig;
use crate::http::handlers;
use crate::lifecycle::{AssistantRuntime, Shutdown};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AssistantRuntime>,
}

pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(runtime: Arc<AssistantRuntime>, config: &AdminConfig) -> Self {
        let router = Self::build_router(AppState { runtime }, Duration::from_secs(config.request_timeout_secs));
        Self { router }
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(handlers::get_health))
            .route("/status", get(handlers::get_status))
            .route("/circuit-breakers", get(handlers::get_circuit_breakers))
            .route("/best-backend", get(handlers::get_best_backend))
            .route("/query", post(handlers::post_query))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}
