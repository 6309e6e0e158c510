//! Relative `downloadUrl` rewriting for download responses.

use axum::body::Bytes;
use serde_json::Value;
use url::Url;

const DOWNLOAD_URL_FIELD: &str = "downloadUrl";

/// Rewrite every relative `downloadUrl` string in `value`, at any depth.
/// Returns how many fields changed.
pub fn rewrite_download_urls(value: &mut Value, base: &str) -> usize {
    match value {
        Value::Object(map) => {
            let mut rewritten = 0;
            for (key, field) in map.iter_mut() {
                if key == DOWNLOAD_URL_FIELD {
                    if let Value::String(url) = &mut *field {
                        if let Some(absolute) = absolutize(url, base) {
                            *url = absolute;
                            rewritten += 1;
                        }
                        continue;
                    }
                }
                rewritten += rewrite_download_urls(field, base);
            }
            rewritten
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_download_urls(item, base))
            .sum(),
        _ => 0,
    }
}

/// Rewrite a JSON body. `None` means the body should be relayed untouched
/// (not JSON, or nothing to rewrite).
pub fn rewrite_body(body: &[u8], base: &str) -> Option<Bytes> {
    let mut value: Value = serde_json::from_slice(body).ok()?;
    if rewrite_download_urls(&mut value, base) == 0 {
        return None;
    }
    serde_json::to_vec(&value).ok().map(Bytes::from)
}

fn absolutize(url: &str, base: &str) -> Option<String> {
    if url.is_empty() || Url::parse(url).is_ok() {
        return None;
    }

    let base = base.trim_end_matches('/');
    if url.starts_with('/') {
        Some(format!("{base}{url}"))
    } else {
        Some(format!("{base}/{url}"))
    }
}
