//! Liveness endpoint. Unauthenticated and never touches upstream.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::Environment;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: Environment,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.gateway().environment,
    })
}
