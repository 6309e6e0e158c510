//! Credential and organization lookup for inbound requests.

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::AuthConfig;
use crate::context::session::{HttpSessionLookup, SessionError, SessionLookup};

/// Organization header, forwarded upstream verbatim.
pub const X_ORGANIZATION_ID: &str = "x-organization-id";

/// Query parameters consulted, in order, when the route allows it.
const ORG_QUERY_PARAMS: [&str; 2] = ["org", "orgId"];

/// Credential and organization for a single forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyContext {
    authorization: String,
    organization_id: String,
}

impl ProxyContext {
    /// Returns `None` unless both values are non-empty and valid header values.
    pub fn new(authorization: impl Into<String>, organization_id: impl Into<String>) -> Option<Self> {
        let authorization = authorization.into();
        let organization_id = organization_id.into();
        if !is_usable(&authorization) || !is_usable(&organization_id) {
            return None;
        }
        Some(Self {
            authorization,
            organization_id,
        })
    }

    /// The `Authorization` value exactly as it will be sent upstream.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

/// Where a route may look for the organization id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextSource {
    /// `X-Organization-Id` header only.
    #[default]
    Headers,
    /// Header first, then `org` / `orgId` query parameters (download links).
    HeadersOrQuery,
}

/// Why a request was turned away before reaching upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextRejection {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Missing organization context")]
    MissingOrganization { status: StatusCode },
}

impl ContextRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            ContextRejection::Unauthorized => StatusCode::UNAUTHORIZED,
            ContextRejection::MissingOrganization { status } => *status,
        }
    }

    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ContextRejection::Unauthorized => "unauthorized",
            ContextRejection::MissingOrganization { .. } => "missing_organization",
        }
    }
}

impl IntoResponse for ContextRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Header-only resolution. Checks the credential before the organization.
pub fn resolve_from_headers(
    headers: &HeaderMap,
    query: Option<&str>,
    source: ContextSource,
    missing_org_status: StatusCode,
) -> Result<ProxyContext, ContextRejection> {
    let authorization = find_credential(headers).ok_or(ContextRejection::Unauthorized)?;
    let organization_id = find_organization(headers, query, source).ok_or(
        ContextRejection::MissingOrganization {
            status: missing_org_status,
        },
    )?;

    ProxyContext::new(authorization, organization_id).ok_or(ContextRejection::Unauthorized)
}

fn find_credential(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, header::AUTHORIZATION.as_str())
}

fn find_organization(headers: &HeaderMap, query: Option<&str>, source: ContextSource) -> Option<String> {
    if let Some(org) = header_str(headers, X_ORGANIZATION_ID) {
        return Some(org.to_string());
    }

    match (source, query) {
        (ContextSource::HeadersOrQuery, Some(query)) => ORG_QUERY_PARAMS.iter().find_map(|param| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, value)| &**key == *param && is_usable(value))
                .map(|(_, value)| value.into_owned())
        }),
        _ => None,
    }
}

/// `HeaderMap` lookups are case-insensitive; non-UTF-8 and blank values count as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !is_blank(v))
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Query and session values are decoded text; they must survive as header values.
fn is_usable(value: &str) -> bool {
    !is_blank(value) && HeaderValue::from_str(value).is_ok()
}

/// Resolves contexts, optionally falling back to a session collaborator.
#[derive(Clone)]
pub struct ContextResolver {
    missing_org_status: StatusCode,
    session: Option<Arc<dyn SessionLookup>>,
}

impl std::fmt::Debug for ContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextResolver")
            .field("missing_org_status", &self.missing_org_status)
            .field("session", &self.session.is_some())
            .finish()
    }
}

impl ContextResolver {
    /// Header-only resolver.
    pub fn new(missing_org_status: StatusCode) -> Self {
        Self {
            missing_org_status,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SessionLookup>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, SessionError> {
        let status =
            StatusCode::from_u16(config.missing_org_status).unwrap_or(StatusCode::UNAUTHORIZED);
        let resolver = Self::new(status);

        match &config.session {
            Some(session) => {
                let lookup = HttpSessionLookup::new(session.endpoint.clone())?;
                Ok(resolver.with_session(Arc::new(lookup)))
            }
            None => Ok(resolver),
        }
    }

    pub fn missing_org_status(&self) -> StatusCode {
        self.missing_org_status
    }

    /// Resolve a context from request headers and query string.
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        query: Option<&str>,
        source: ContextSource,
    ) -> Result<ProxyContext, ContextRejection> {
        match resolve_from_headers(headers, query, source, self.missing_org_status) {
            Err(ContextRejection::Unauthorized) => match &self.session {
                Some(session) => self.resolve_from_session(session.as_ref(), headers, query, source).await,
                None => Err(ContextRejection::Unauthorized),
            },
            resolved => resolved,
        }
    }

    async fn resolve_from_session(
        &self,
        session: &dyn SessionLookup,
        headers: &HeaderMap,
        query: Option<&str>,
        source: ContextSource,
    ) -> Result<ProxyContext, ContextRejection> {
        let cookie = header_str(headers, header::COOKIE.as_str()).ok_or(ContextRejection::Unauthorized)?;

        let session = match session.lookup(cookie).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(ContextRejection::Unauthorized),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed");
                return Err(ContextRejection::Unauthorized);
            }
        };

        let authorization = format!("Bearer {}", session.token);
        if is_blank(&session.token) || !is_usable(&authorization) {
            return Err(ContextRejection::Unauthorized);
        }

        let organization_id = find_organization(headers, query, source)
            .or(session.active_organization_id.filter(|org| is_usable(org)))
            .ok_or(ContextRejection::MissingOrganization {
                status: self.missing_org_status,
            })?;

        ProxyContext::new(authorization, organization_id).ok_or(ContextRejection::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::session::Session;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    fn resolve(
        map: &HeaderMap,
        query: Option<&str>,
        source: ContextSource,
    ) -> Result<ProxyContext, ContextRejection> {
        resolve_from_headers(map, query, source, StatusCode::UNAUTHORIZED)
    }

    #[test]
    fn test_resolves_both_headers() {
        let map = headers(&[("authorization", "Bearer abc"), ("x-organization-id", "org-1")]);
        let ctx = resolve(&map, None, ContextSource::Headers).unwrap();
        assert_eq!(ctx.authorization(), "Bearer abc");
        assert_eq!(ctx.organization_id(), "org-1");
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        map.insert("X-Organization-Id", HeaderValue::from_static("org-1"));
        assert!(resolve(&map, None, ContextSource::Headers).is_ok());
    }

    #[test]
    fn test_missing_everything_is_unauthorized() {
        let rejection = resolve(&HeaderMap::new(), None, ContextSource::Headers).unwrap_err();
        assert_eq!(rejection, ContextRejection::Unauthorized);
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_missing_org_uses_configured_status() {
        let map = headers(&[("authorization", "Bearer abc")]);
        let rejection =
            resolve_from_headers(&map, None, ContextSource::Headers, StatusCode::BAD_REQUEST)
                .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.to_string(), "Missing organization context");
    }

    #[test]
    fn test_blank_values_are_absent() {
        let map = headers(&[("authorization", "  "), ("x-organization-id", "org-1")]);
        assert_eq!(
            resolve(&map, None, ContextSource::Headers).unwrap_err(),
            ContextRejection::Unauthorized
        );
    }

    #[test]
    fn test_query_fallback_only_when_allowed() {
        let map = headers(&[("authorization", "Bearer abc")]);

        let rejection = resolve(&map, Some("org=org-q"), ContextSource::Headers).unwrap_err();
        assert_eq!(rejection.reason(), "missing_organization");

        let ctx = resolve(&map, Some("org=org-q"), ContextSource::HeadersOrQuery).unwrap();
        assert_eq!(ctx.organization_id(), "org-q");

        let ctx = resolve(&map, Some("orgId=org%20two"), ContextSource::HeadersOrQuery).unwrap();
        assert_eq!(ctx.organization_id(), "org two");
    }

    #[test]
    fn test_org_param_beats_org_id_param() {
        let map = headers(&[("authorization", "Bearer abc")]);
        let ctx = resolve(&map, Some("orgId=second&org=first"), ContextSource::HeadersOrQuery).unwrap();
        assert_eq!(ctx.organization_id(), "first");
    }

    #[test]
    fn test_header_beats_query() {
        let map = headers(&[("authorization", "Bearer abc"), ("x-organization-id", "org-h")]);
        let ctx = resolve(&map, Some("org=org-q"), ContextSource::HeadersOrQuery).unwrap();
        assert_eq!(ctx.organization_id(), "org-h");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let map = headers(&[("authorization", "Bearer abc"), ("x-organization-id", "org-1")]);
        let first = resolve(&map, None, ContextSource::Headers);
        let second = resolve(&map, None, ContextSource::Headers);
        assert_eq!(first, second);
    }

    #[test]
    fn test_proxy_context_rejects_empty_fields() {
        assert!(ProxyContext::new("", "org").is_none());
        assert!(ProxyContext::new("Bearer x", "").is_none());
        assert!(ProxyContext::new("Bearer x", "org\n1").is_none());
    }

    #[test]
    fn test_query_org_with_control_character_is_absent() {
        let map = headers(&[("authorization", "Bearer abc")]);
        let rejection = resolve(&map, Some("org=org%0A1"), ContextSource::HeadersOrQuery).unwrap_err();
        assert_eq!(rejection.reason(), "missing_organization");

        let ctx = resolve(&map, Some("org=org%0A1&orgId=org-2"), ContextSource::HeadersOrQuery).unwrap();
        assert_eq!(ctx.organization_id(), "org-2");
    }

    struct FixedSession {
        session: Option<Session>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SessionLookup for FixedSession {
        async fn lookup(&self, _cookie: &str) -> Result<Option<Session>, SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.session.clone())
        }
    }

    fn session_resolver(session: Option<Session>) -> (ContextResolver, Arc<FixedSession>) {
        let lookup = Arc::new(FixedSession {
            session,
            calls: AtomicUsize::new(0),
        });
        let resolver = ContextResolver::new(StatusCode::UNAUTHORIZED).with_session(lookup.clone());
        (resolver, lookup)
    }

    #[tokio::test]
    async fn test_session_mints_bearer_token() {
        let (resolver, _) = session_resolver(Some(Session {
            token: "sess-token".into(),
            active_organization_id: Some("org-s".into()),
        }));
        let map = headers(&[("cookie", "session=xyz")]);

        let ctx = resolver.resolve(&map, None, ContextSource::Headers).await.unwrap();
        assert_eq!(ctx.authorization(), "Bearer sess-token");
        assert_eq!(ctx.organization_id(), "org-s");
    }

    #[tokio::test]
    async fn test_session_token_unfit_for_header_is_unauthorized() {
        let (resolver, _) = session_resolver(Some(Session {
            token: "sess\r\ntoken".into(),
            active_organization_id: Some("org-s".into()),
        }));
        let map = headers(&[("cookie", "session=xyz")]);

        let rejection = resolver.resolve(&map, None, ContextSource::Headers).await.unwrap_err();
        assert_eq!(rejection, ContextRejection::Unauthorized);
    }

    #[tokio::test]
    async fn test_session_org_yields_to_header() {
        let (resolver, _) = session_resolver(Some(Session {
            token: "sess-token".into(),
            active_organization_id: Some("org-s".into()),
        }));
        let map = headers(&[("cookie", "session=xyz"), ("x-organization-id", "org-h")]);

        let ctx = resolver.resolve(&map, None, ContextSource::Headers).await.unwrap();
        assert_eq!(ctx.organization_id(), "org-h");
    }

    #[tokio::test]
    async fn test_session_without_org_is_missing_organization() {
        let (resolver, _) = session_resolver(Some(Session {
            token: "sess-token".into(),
            active_organization_id: None,
        }));
        let map = headers(&[("cookie", "session=xyz")]);

        let rejection = resolver.resolve(&map, None, ContextSource::Headers).await.unwrap_err();
        assert_eq!(rejection.reason(), "missing_organization");
    }

    #[tokio::test]
    async fn test_header_credential_skips_session() {
        let (resolver, lookup) = session_resolver(None);
        let map = headers(&[("authorization", "Bearer abc"), ("x-organization-id", "org-1")]);

        assert!(resolver.resolve(&map, None, ContextSource::Headers).await.is_ok());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_cookie_no_session_call() {
        let (resolver, lookup) = session_resolver(None);
        let rejection = resolver
            .resolve(&HeaderMap::new(), None, ContextSource::Headers)
            .await
            .unwrap_err();
        assert_eq!(rejection, ContextRejection::Unauthorized);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }
}
