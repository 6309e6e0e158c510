//! Session collaborator.
//!
//! The gateway never mints tokens itself. When a request arrives without an
//! `Authorization` header, the inbound `Cookie` header is handed to an
//! external session service, which answers with a bearer token and the
//! user's active organization (or nothing).

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use serde::Deserialize;

/// A session as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub active_organization_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session endpoint returned {0}")]
    Status(StatusCode),
}

/// Looks up the session belonging to a cookie header.
#[async_trait]
pub trait SessionLookup: Send + Sync {
    /// `Ok(None)` means "no signed-in user", not a failure.
    async fn lookup(&self, cookie: &str) -> Result<Option<Session>, SessionError>;
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: SessionRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    token: String,
    #[serde(default)]
    active_organization_id: Option<String>,
}

/// Session lookup over HTTP: `GET <endpoint>` with the inbound cookie.
#[derive(Debug, Clone)]
pub struct HttpSessionLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSessionLookup {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SessionLookup for HttpSessionLookup {
    async fn lookup(&self, cookie: &str) -> Result<Option<Session>, SessionError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::COOKIE, cookie)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::Status(status));
        }

        // A signed-out user is reported as a JSON `null` body.
        let envelope: Option<SessionEnvelope> = response.json().await?;
        Ok(envelope.map(|e| Session {
            token: e.session.token,
            active_organization_id: e.session.active_organization_id,
        }))
    }
}
