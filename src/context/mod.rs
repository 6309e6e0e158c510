//! Proxy context resolution.
//!
//! # Data Flow
//! ```text
//! Inbound request (headers, query string)
//!     → resolver.rs (Authorization + X-Organization-Id, query fallback)
//!     → [no credential and a session collaborator is configured]
//!         session.rs (Cookie → bearer token + active organization)
//!     → ProxyContext or ContextRejection (ready-to-send 401/400)
//! ```
//!
//! # Design Decisions
//! - A context is either complete or a rejection; nothing partial leaves here
//! - Header lookup is pure and synchronous; only the session path awaits
//! - Credential and organization values are never logged

pub mod resolver;
pub mod session;

pub use resolver::{
    resolve_from_headers, ContextRejection, ContextResolver, ContextSource, ProxyContext,
    X_ORGANIZATION_ID,
};
pub use session::{HttpSessionLookup, Session, SessionError, SessionLookup};
