//! Forwarded request descriptor.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};

/// One logical upstream call.
///
/// A JSON content type accompanies any body unless the caller sets its own
/// `Content-Type` through [`ForwardRequest::header`].
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    path: String,
    method: Method,
    body: Option<Bytes>,
    headers: HeaderMap,
    rewrite_download_url: bool,
}

impl ForwardRequest {
    /// A GET to `path` (which may carry a query string).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            rewrite_download_url: false,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Extra upstream header. Context headers set by the forwarder win over these.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Rewrite relative `downloadUrl` fields in JSON responses.
    pub fn rewrite_download_url(mut self, enabled: bool) -> Self {
        self.rewrite_download_url = enabled;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn http_method(&self) -> &Method {
        &self.method
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn rewrites_download_url(&self) -> bool {
        self.rewrite_download_url
    }

    /// Extra headers with the body content type filled in.
    pub(crate) fn upstream_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if self.body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        headers
    }

    pub(crate) fn into_body(self) -> Option<Bytes> {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_get_without_body() {
        let req = ForwardRequest::new("/v1/comments");
        assert_eq!(req.http_method(), Method::GET);
        assert!(!req.has_body());
        assert!(!req.upstream_headers().contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_body_implies_json_content_type() {
        let req = ForwardRequest::new("/v1/comments")
            .method(Method::POST)
            .body(r#"{"content":"hi"}"#);
        assert_eq!(
            req.upstream_headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_caller_content_type_wins() {
        let req = ForwardRequest::new("/v1/attachments")
            .method(Method::POST)
            .body("raw")
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(
            req.upstream_headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }
}
