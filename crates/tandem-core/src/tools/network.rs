//! HTTP fetch tool.

use serde_json::{json, Value};
use tracing::debug;

use super::require_str;

/// Default cap on returned body bytes.
const DEFAULT_MAX_BYTES: u64 = 64 * 1024;

pub async fn execute_http_fetch(args: &Value) -> Result<Value, String> {
    let url = require_str(args, "url")?;
    let max_bytes = args
        .get("max_bytes")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_MAX_BYTES) as usize;
    debug!("Fetching URL: {}", url);

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!(
            "'{}' is not an http(s) URL. Include the protocol, e.g. https://example.com",
            url
        ));
    }

    let response = reqwest::get(url)
        .await
        .map_err(|e| format!("request to '{}' failed: {}", url, e))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| format!("could not read response body from '{}': {}", url, e))?;

    let truncated = body.len() > max_bytes;
    let body = if truncated {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < max_bytes)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        body[..cut].to_string()
    } else {
        body
    };

    Ok(json!({
        "url": url,
        "status": status,
        "body": body,
        "truncated": truncated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_url_without_protocol() {
        let err = execute_http_fetch(&json!({ "url": "example.com/page" }))
            .await
            .unwrap_err();
        assert!(err.contains("Include the protocol"));
    }

    #[tokio::test]
    async fn test_missing_url_parameter() {
        let err = execute_http_fetch(&json!({})).await.unwrap_err();
        assert!(err.contains("missing required parameter 'url'"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let err = execute_http_fetch(&json!({
            "url": "http://localhost:1/unroutable"
        }))
        .await
        .unwrap_err();
        assert!(err.contains("request to"));
    }
}
