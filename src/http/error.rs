//! Gateway error envelope.
//!
//! Every failure the gateway itself produces is rendered as
//! `{"error": "<message>"}`. Upstream error responses are not routed through
//! here; they are relayed verbatim by the forwarder.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::context::ContextRejection;
use crate::forward::ForwardError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Context(#[from] ContextRejection),

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Invalid path parameter")]
    InvalidPathParam,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Failed to read request body")]
    Body,

    #[error("Failed to reach upstream service")]
    Upstream(#[from] ForwardError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Context(rejection) => rejection.status(),
            ApiError::InvalidJson | ApiError::InvalidPathParam | ApiError::Body => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Upstream(e) = &self {
            // Details stay in the log; clients only see the generic message.
            tracing::error!(error = %e, "Upstream call failed");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
