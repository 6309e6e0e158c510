//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown, live reload)
//!     → request.rs (request ID set + propagated)
//!     → routes.rs (path params → upstream path, body check)
//!     → context resolver → forwarder
//!     → error.rs ({"error": ...} envelope for gateway-originated failures)
//!     → Send to client
//! ```

pub mod error;
pub mod health;
pub mod request;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use request::{GatewayRequestId, X_REQUEST_ID};
pub use server::{AppState, Gateway, GatewayError, GatewayServer};
