//! Single-attempt upstream forwarder.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::{Environment, UpstreamConfig};
use crate::context::{ProxyContext, X_ORGANIZATION_ID};
use crate::forward::request::ForwardRequest;
use crate::forward::rewrite::rewrite_body;

/// Service key header, sent when the gateway is configured with one.
pub const X_API_KEY: &str = "x-api-key";

const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("path {0:?} is outside the allowed API prefixes")]
    InvalidPath(String),

    #[error("invalid value for upstream header {0}")]
    InvalidHeader(&'static str),

    #[error("failed to build upstream client: {0}")]
    Client(reqwest::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Upstream status, content type and body, ready to relay.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    /// `None` only for 204 responses.
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Relays one call per request to the upstream API.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<HeaderValue>,
    allowed_prefixes: Vec<String>,
    diagnostics: bool,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig, environment: Environment) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(ForwardError::Client)?;

        let api_key = match config.api_key.as_deref() {
            Some(key) => Some(sensitive_value(key, X_API_KEY)?),
            None => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            allowed_prefixes: config.allowed_prefixes.clone(),
            diagnostics: !environment.is_production(),
        })
    }

    /// Upstream base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward `request` with the context's credential and organization.
    pub async fn forward(
        &self,
        ctx: &ProxyContext,
        request: ForwardRequest,
    ) -> Result<ForwardedResponse, ForwardError> {
        let path_only = path_without_query(request.path());
        self.check_path(path_only)?;

        let mut headers = request.upstream_headers();
        headers.insert(
            header::AUTHORIZATION,
            sensitive_value(ctx.authorization(), "authorization")?,
        );
        headers.insert(
            HeaderName::from_static(X_ORGANIZATION_ID),
            HeaderValue::from_str(ctx.organization_id())
                .map_err(|_| ForwardError::InvalidHeader(X_ORGANIZATION_ID))?,
        );
        if let Some(key) = &self.api_key {
            headers.insert(HeaderName::from_static(X_API_KEY), key.clone());
        }

        let method = request.http_method().clone();
        if self.diagnostics {
            tracing::debug!(
                path = %path_only,
                method = %method,
                has_auth = true,
                has_body = request.has_body(),
                "Forwarding upstream"
            );
        }

        let url = format!("{}{}", self.base_url, request.path());
        let rewrite = request.rewrites_download_url();
        let path_only = path_only.to_string();

        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if let Some(body) = request.into_body() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(ForwardedResponse {
                status,
                content_type: None,
                body: Bytes::new(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let body = response.bytes().await?;

        if self.diagnostics && !status.is_success() {
            tracing::warn!(
                path = %path_only,
                method = %method,
                status = status.as_u16(),
                "Upstream returned error status"
            );
        }

        let body = if rewrite && is_json(&content_type) {
            rewrite_body(&body, &self.base_url).unwrap_or(body)
        } else {
            body
        };

        Ok(ForwardedResponse {
            status,
            content_type: Some(content_type),
            body,
        })
    }

    fn check_path(&self, path: &str) -> Result<(), ForwardError> {
        let allowed = self
            .allowed_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        let traverses = path.split('/').any(|segment| segment == "." || segment == "..");

        if allowed && !traverses {
            Ok(())
        } else {
            Err(ForwardError::InvalidPath(path.to_string()))
        }
    }
}

fn path_without_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn sensitive_value(value: &str, name: &'static str) -> Result<HeaderValue, ForwardError> {
    let mut value = HeaderValue::from_str(value).map_err(|_| ForwardError::InvalidHeader(name))?;
    value.set_sensitive(true);
    Ok(value)
}

fn is_json(content_type: &HeaderValue) -> bool {
    content_type
        .to_str()
        .ok()
        .and_then(|ct| ct.split(';').next())
        .map(|essence| {
            let essence = essence.trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}
