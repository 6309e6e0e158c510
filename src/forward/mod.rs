//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyContext + ForwardRequest (path, method, body, extra headers)
//!     → forwarder.rs (prefix check, header build, single upstream attempt)
//!     → 204? return empty body, never read
//!     → rewrite.rs (relative downloadUrl → absolute, JSON download routes only)
//!     → ForwardedResponse (status, content type, body)
//! ```
//!
//! # Design Decisions
//! - One attempt per request; no retries, no local deadline
//! - Status and body are relayed verbatim; only content type is normalized
//! - Transport failures are returned to the caller, never swallowed

pub mod forwarder;
pub mod request;
pub mod rewrite;

pub use forwarder::{ForwardError, ForwardedResponse, Forwarder, X_API_KEY};
pub use request::ForwardRequest;
