//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    http::{request, Method, Request},
    response::Response,
    Router,
};
use comp_gateway::config::GatewayConfig;
use comp_gateway::{GatewayServer, Shutdown};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use wiremock::{matchers::any, Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "Bearer abc";
pub const ORG: &str = "org-1";

/// Default config pointed at a mock upstream.
pub fn config_for(upstream: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = upstream.uri();
    config
}

pub fn gateway_router(config: &GatewayConfig) -> Router {
    GatewayServer::new(config)
        .expect("gateway should build from test config")
        .router()
}

/// Request builder carrying the standard credential and organization.
pub fn authed(method: Method, uri: &str) -> request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", TOKEN)
        .header("x-organization-id", ORG)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Fail the test (on mock server drop) if anything reaches upstream.
pub async fn forbid_upstream_calls(upstream: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(upstream)
        .await;
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A gateway served on an ephemeral port.
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> RunningGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = GatewayServer::new(&config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    RunningGateway {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}
