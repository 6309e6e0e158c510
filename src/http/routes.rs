//! Gateway route table.
//!
//! Every `/api/*` route is one [`ProxyCall`]: resolve the proxy context,
//! build the upstream path from path parameters, check the JSON body, and
//! forward once. Routes differ only in upstream path, method and [`RouteSpec`].

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, put},
    Router,
};
use serde::de::IgnoredAny;
use url::Url;

use crate::context::ContextSource;
use crate::forward::{ForwardRequest, ForwardedResponse};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Upstream API version prefix.
const UPSTREAM_PREFIX: &str = "/v1";

/// How a route resolves context and treats the upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteSpec {
    pub source: ContextSource,
    pub rewrite_download_url: bool,
    pub forward_query: bool,
}

/// Header-only context, query dropped, body relayed as-is.
pub const STANDARD: RouteSpec = RouteSpec {
    source: ContextSource::Headers,
    rewrite_download_url: false,
    forward_query: false,
};

/// Like [`STANDARD`] but the inbound query string is forwarded.
pub const LISTING: RouteSpec = RouteSpec {
    forward_query: true,
    ..STANDARD
};

/// Download links: organization may come from `?org=`; `downloadUrl` made absolute.
pub const DOWNLOAD: RouteSpec = RouteSpec {
    source: ContextSource::HeadersOrQuery,
    rewrite_download_url: true,
    forward_query: false,
};

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Body
        }
    }
}

/// Build `/v1/<segments...>`, rejecting segments that could escape their position.
///
/// Path parameters arrive percent-decoded, so each segment is re-encoded.
pub fn upstream_path(segments: &[&str]) -> Result<String, ApiError> {
    if !segments.iter().all(|segment| is_valid_segment(segment)) {
        return Err(ApiError::InvalidPathParam);
    }

    let mut url = Url::parse(&format!("http://upstream{UPSTREAM_PREFIX}"))
        .map_err(|_| ApiError::InvalidPathParam)?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidPathParam)?
        .extend(segments);
    Ok(url.path().to_string())
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '?', '#'])
        && !segment.chars().any(char::is_control)
}

/// One proxied request.
pub struct ProxyCall<'a> {
    route: &'static str,
    method: Method,
    segments: &'a [&'a str],
    spec: RouteSpec,
    query: Option<String>,
    body: Option<Result<Bytes, BytesRejection>>,
}

impl<'a> ProxyCall<'a> {
    pub fn new(route: &'static str, method: Method, segments: &'a [&'a str]) -> Self {
        Self {
            route,
            method,
            segments,
            spec: STANDARD,
            query: None,
            body: None,
        }
    }

    pub fn spec(mut self, spec: RouteSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Attach a body that must be valid JSON.
    pub fn json_body(mut self, body: Result<Bytes, BytesRejection>) -> Self {
        self.body = Some(body);
        self
    }

    pub async fn dispatch(self, state: &AppState, headers: &HeaderMap) -> Response {
        let start = Instant::now();
        let route = self.route;
        let method = self.method.clone();

        let response = match self.run(state, headers).await {
            Ok(forwarded) => forwarded.into_response(),
            Err(e) => {
                match &e {
                    ApiError::Context(rejection) => metrics::record_rejection(route, rejection.reason()),
                    ApiError::Upstream(_) => metrics::record_upstream_error(route),
                    _ => {}
                }
                e.into_response()
            }
        };

        metrics::record_request(route, &method, response.status().as_u16(), start);
        response
    }

    async fn run(self, state: &AppState, headers: &HeaderMap) -> Result<ForwardedResponse, ApiError> {
        let gateway = state.gateway();
        let ctx = gateway
            .resolver
            .resolve(headers, self.query.as_deref(), self.spec.source)
            .await?;

        let mut path = upstream_path(self.segments)?;
        if self.spec.forward_query {
            if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
                path.push('?');
                path.push_str(query);
            }
        }

        let mut request = ForwardRequest::new(path)
            .method(self.method)
            .rewrite_download_url(self.spec.rewrite_download_url);

        if let Some(body) = self.body {
            let body = body?;
            serde_json::from_slice::<IgnoredAny>(&body).map_err(|_| ApiError::InvalidJson)?;
            request = request.body(body);
        }

        Ok(gateway.forwarder.forward(&ctx, request).await?)
    }
}

/// All `/api/*` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/attachments/download/{attachment_id}",
            get(download_attachment),
        )
        .route(
            "/api/attachments/{task_id}",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/api/attachments/{task_id}/{attachment_id}",
            delete(delete_attachment),
        )
        .route("/api/comments", get(list_comments).post(create_comment))
        .route(
            "/api/comments/{comment_id}",
            put(update_comment).patch(update_comment).delete(delete_comment),
        )
        .route(
            "/api/tasks/{task_id}/comments",
            get(list_task_comments).post(create_task_comment),
        )
        .route(
            "/api/tasks/{task_id}/comments/{comment_id}",
            patch(update_task_comment).delete(delete_task_comment),
        )
}

async fn list_attachments(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new("attachments.list", Method::GET, &["tasks", task_id.as_str(), "attachments"])
        .dispatch(&state, &headers)
        .await
}

async fn upload_attachment(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    ProxyCall::new("attachments.upload", Method::POST, &["tasks", task_id.as_str(), "attachments"])
        .json_body(body)
        .dispatch(&state, &headers)
        .await
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path((task_id, attachment_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new(
        "attachments.delete",
        Method::DELETE,
        &["tasks", task_id.as_str(), "attachments", attachment_id.as_str()],
    )
    .dispatch(&state, &headers)
    .await
}

async fn download_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new(
        "attachments.download",
        Method::GET,
        &["attachments", attachment_id.as_str(), "download"],
    )
    .spec(DOWNLOAD)
    .query(query)
    .dispatch(&state, &headers)
    .await
}

async fn list_comments(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new("comments.list", Method::GET, &["comments"])
        .spec(LISTING)
        .query(query)
        .dispatch(&state, &headers)
        .await
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    ProxyCall::new("comments.create", Method::POST, &["comments"])
        .json_body(body)
        .dispatch(&state, &headers)
        .await
}

async fn update_comment(
    State(state): State<AppState>,
    method: Method,
    Path(comment_id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    ProxyCall::new("comments.update", method, &["comments", comment_id.as_str()])
        .json_body(body)
        .dispatch(&state, &headers)
        .await
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new("comments.delete", Method::DELETE, &["comments", comment_id.as_str()])
        .dispatch(&state, &headers)
        .await
}

async fn list_task_comments(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new("task_comments.list", Method::GET, &["tasks", task_id.as_str(), "comments"])
        .dispatch(&state, &headers)
        .await
}

async fn create_task_comment(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    ProxyCall::new("task_comments.create", Method::POST, &["tasks", task_id.as_str(), "comments"])
        .json_body(body)
        .dispatch(&state, &headers)
        .await
}

async fn update_task_comment(
    State(state): State<AppState>,
    Path((task_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    ProxyCall::new(
        "task_comments.update",
        Method::PATCH,
        &["tasks", task_id.as_str(), "comments", comment_id.as_str()],
    )
    .json_body(body)
    .dispatch(&state, &headers)
    .await
}

async fn delete_task_comment(
    State(state): State<AppState>,
    Path((task_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    ProxyCall::new(
        "task_comments.delete",
        Method::DELETE,
        &["tasks", task_id.as_str(), "comments", comment_id.as_str()],
    )
    .dispatch(&state, &headers)
    .await
}
