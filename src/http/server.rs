//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - JSON 404/405 fallbacks
//! - Hold the live gateway (resolver + forwarder) behind an atomic swap
//! - Apply validated config reloads without dropping connections
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{Environment, GatewayConfig};
use crate::context::{ContextResolver, SessionError};
use crate::forward::{ForwardError, Forwarder};
use crate::http::health;
use crate::http::request::{request_id_of, GatewayRequestId, X_REQUEST_ID};
use crate::http::routes;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to build forwarder: {0}")]
    Forwarder(#[from] ForwardError),

    #[error("failed to build session lookup: {0}")]
    Session(#[from] SessionError),
}

/// The request-path components built from one configuration.
#[derive(Debug)]
pub struct Gateway {
    pub environment: Environment,
    pub resolver: ContextResolver,
    pub forwarder: Forwarder,
}

impl Gateway {
    pub fn new(environment: Environment, resolver: ContextResolver, forwarder: Forwarder) -> Self {
        Self {
            environment,
            resolver,
            forwarder,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            environment: config.environment,
            resolver: ContextResolver::from_config(&config.auth)?,
            forwarder: Forwarder::new(&config.upstream, config.environment)?,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    live: Arc<ArcSwap<Gateway>>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            live: Arc::new(ArcSwap::from_pointee(gateway)),
        }
    }

    /// Snapshot of the current gateway; a request keeps using it even if a reload lands.
    pub fn gateway(&self) -> Arc<Gateway> {
        self.live.load_full()
    }

    pub fn replace(&self, gateway: Gateway) {
        self.live.store(Arc::new(gateway));
    }
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a new server from a validated configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let gateway = Gateway::from_config(config)?;
        Ok(Self::with_gateway(config, gateway))
    }

    /// Create a server around pre-built components (e.g. a custom session lookup).
    pub fn with_gateway(config: &GatewayConfig, gateway: Gateway) -> Self {
        let state = AppState::new(gateway);
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Listener address and body limit are fixed for the router's lifetime.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .merge(routes::api_routes())
            .route("/health", get(health::health))
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, GatewayRequestId))
                    .layer(
                        TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                            // Path only: download links may carry the organization in the query.
                            tracing::info_span!(
                                "request",
                                method = %request.method(),
                                path = %request.uri().path(),
                                request_id = %request_id_of(request),
                            )
                        }),
                    )
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloads = tokio::spawn(apply_config_updates(self.state.clone(), config_updates));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloads.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_config_updates(state: AppState, mut updates: mpsc::UnboundedReceiver<GatewayConfig>) {
    while let Some(config) = updates.recv().await {
        match Gateway::from_config(&config) {
            Ok(gateway) => {
                state.replace(gateway);
                tracing::info!(environment = ?config.environment, "Configuration reloaded");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to apply reloaded configuration, keeping current");
            }
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}
