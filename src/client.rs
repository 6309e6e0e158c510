//! Typed client for the gateway's `/api/*` routes.
//!
//! Used by `gateway-cli` and the integration tests. Only proxy routes may be
//! called; direct upstream paths are refused before any request is sent.

use std::path::Path;

use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::context::X_ORGANIZATION_ID;

const PROXY_PREFIX: &str = "/api/";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("direct API calls not allowed; use /api/* proxy routes (got {0:?})")]
    NotProxyRoute(String),

    #[error("invalid id {0:?}")]
    InvalidId(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Outcome of a JSON call: `data` on success, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Raw download result.
#[derive(Debug, Clone)]
pub struct Download {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Attachment upload payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub file_name: String,
    pub file_type: String,
    /// Base64 file content without a `data:` prefix.
    pub file_data: String,
}

impl AttachmentUpload {
    pub fn from_bytes(file_name: impl Into<String>, file_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            file_data: STANDARD.encode(bytes),
        }
    }
}

/// New comment payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub entity_id: String,
    pub entity_type: String,
}

pub struct GatewayClient {
    client: Client,
    base_url: String,
    authorization: String,
    organization_id: String,
}

impl GatewayClient {
    /// `authorization` is sent verbatim (e.g. `"Bearer <token>"`).
    pub fn new(
        base_url: &str,
        authorization: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: authorization.into(),
            organization_id: organization_id.into(),
        }
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    pub async fn list_attachments(&self, task_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.call(Method::GET, &api_path(&["attachments", task_id])?, None::<&()>)
            .await
    }

    pub async fn upload_attachment(
        &self,
        task_id: &str,
        upload: &AttachmentUpload,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.call(Method::POST, &api_path(&["attachments", task_id])?, Some(upload))
            .await
    }

    /// Read `file` from disk and upload it.
    pub async fn upload_file(
        &self,
        task_id: &str,
        file: &Path,
        file_type: Option<&str>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| ClientError::Io {
            path: file.display().to_string(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let upload = AttachmentUpload::from_bytes(
            file_name,
            file_type.unwrap_or("application/octet-stream"),
            &bytes,
        );
        self.upload_attachment(task_id, &upload).await
    }

    pub async fn delete_attachment(
        &self,
        task_id: &str,
        attachment_id: &str,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.call(
            Method::DELETE,
            &api_path(&["attachments", task_id, attachment_id])?,
            None::<&()>,
        )
        .await
    }

    pub async fn download_attachment(&self, attachment_id: &str) -> Result<Download, ClientError> {
        let response = self
            .request(Method::GET, &api_path(&["attachments", "download", attachment_id])?)?
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?;

        Ok(Download {
            status,
            content_type,
            body,
        })
    }

    pub async fn list_comments(
        &self,
        entity_id: &str,
        entity_type: &str,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("entityId", entity_id)
            .append_pair("entityType", entity_type)
            .finish();
        self.call(Method::GET, &format!("/api/comments?{query}"), None::<&()>)
            .await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<ApiResponse<Value>, ClientError> {
        self.call(Method::POST, "/api/comments", Some(comment)).await
    }

    pub async fn update_comment(
        &self,
        comment_id: &str,
        content: &str,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let body = serde_json::json!({ "content": content });
        self.call(Method::PUT, &api_path(&["comments", comment_id])?, Some(&body))
            .await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.call(Method::DELETE, &api_path(&["comments", comment_id])?, None::<&()>)
            .await
    }

    /// Perform a JSON call against a proxy route.
    pub async fn call<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text).ok();
            return Ok(ApiResponse {
                data: None,
                error: Some(error_message(body.as_ref(), status)),
                status: status.as_u16(),
            });
        }

        let data = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok(ApiResponse {
            data,
            error: None,
            status: status.as_u16(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ClientError> {
        if !path.starts_with(PROXY_PREFIX) {
            return Err(ClientError::NotProxyRoute(path.to_string()));
        }
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::AUTHORIZATION, &self.authorization)
            .header(X_ORGANIZATION_ID, &self.organization_id))
    }
}

/// `/api/<segments...>` with each id encoded as exactly one path segment.
fn api_path(segments: &[&str]) -> Result<String, ClientError> {
    if let Some(bad) = segments
        .iter()
        .find(|segment| segment.is_empty() || **segment == "." || **segment == "..")
    {
        return Err(ClientError::InvalidId(bad.to_string()));
    }

    let mut url = Url::parse("http://gateway/api")
        .map_err(|_| ClientError::NotProxyRoute(segments.join("/")))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::NotProxyRoute(segments.join("/")))?
        .extend(segments);
    Ok(url.path().to_string())
}

/// `error`, then `message`, then a generic fallback.
fn error_message(body: Option<&Value>, status: StatusCode) -> String {
    body.and_then(|b| b.get("error").or_else(|| b.get("message")))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()))
}
