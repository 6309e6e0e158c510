//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, status codes, addresses)
//! - Validate the upstream base URL is absolute
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.query().is_some() || url.fragment().is_some() {
                errors.push(ValidationError::new(
                    "upstream.base_url",
                    "must not carry a query or fragment",
                ));
            }
        }
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme {:?}", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("not an absolute URL: {e}"),
        )),
    }

    if config.upstream.allowed_prefixes.is_empty() {
        errors.push(ValidationError::new(
            "upstream.allowed_prefixes",
            "at least one prefix is required",
        ));
    }
    for prefix in &config.upstream.allowed_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "upstream.allowed_prefixes",
                format!("{prefix:?} must start with '/'"),
            ));
        }
    }

    if matches!(config.upstream.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::new(
            "upstream.api_key",
            "must not be empty when set",
        ));
    }

    if !matches!(config.auth.missing_org_status, 400 | 401) {
        errors.push(ValidationError::new(
            "auth.missing_org_status",
            format!("must be 400 or 401, got {}", config.auth.missing_org_status),
        ));
    }

    if let Some(session) = &config.auth.session {
        if Url::parse(&session.endpoint).is_err() {
            errors.push(ValidationError::new(
                "auth.session.endpoint",
                format!("{:?} is not an absolute URL", session.endpoint),
            ));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "{:?} is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
