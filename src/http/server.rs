//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Drain connections on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::CastLabConfig;
use crate::funding::service::FundingService;
use crate::http::handlers;
use crate::http::request::request_id_middleware;
use crate::marketplace::store::ExperimentStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: ExperimentStore,
    /// `None` when the chain integration is disabled; funding routes
    /// answer 503 in that mode while the catalog keeps working.
    pub funding: Option<Arc<FundingService>>,
}

/// HTTP server for the marketplace API.
pub struct HttpServer {
    router: Router,
    config: CastLabConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and state.
    pub fn new(config: CastLabConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &CastLabConfig, state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(handlers::healthz))
            .route(
                "/api/experiments",
                get(handlers::list_experiments).post(handlers::create_experiment),
            )
            .route("/api/experiments/{id}", get(handlers::get_experiment))
            .route("/api/experiments/{id}/position/{address}", get(handlers::get_position))
            .route("/api/experiments/{id}/fund", post(handlers::fund))
            .route("/api/experiments/{id}/deposit/retry", post(handlers::retry_deposit))
            .route("/api/experiments/{id}/withdraw", post(handlers::withdraw))
            .route("/api/experiments/{id}/bet", post(handlers::place_bet))
            .route("/api/experiments/{id}/claim", post(handlers::claim))
            .route("/api/wallet", get(handlers::wallet))
            .route("/api/faucet/mint", post(handlers::mint))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &CastLabConfig {
        &self.config
    }
}
