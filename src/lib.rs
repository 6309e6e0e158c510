//! Authenticated API gateway for the compliance platform.
//!
//! Browser-facing `/api/*` routes resolve a proxy context (credential and
//! organization) and forward exactly one call to the upstream `/v1/*` API.

pub mod client;
pub mod config;
pub mod context;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
