use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::adapters::{AdapterError, FailureKind};
use crate::error::{Result, WaypointError};
use crate::router::Backend;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_ERROR_BODY_LEN: usize = 300;

pub(super) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| WaypointError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// The model identifier from backend metadata; required by every HTTP adapter
pub(super) fn require_model(backend: &Backend, adapter: &str) -> Result<String> {
    backend.model().map(str::to_string).ok_or_else(|| {
        WaypointError::configuration(format!(
            "{} model name must be specified in metadata.model for backend '{}'",
            adapter, backend.name
        ))
    })
}

/// Configured key first, then the environment
pub(super) fn resolve_api_key(configured: Option<String>, env_var: &str, backend: &str) -> Result<String> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Ok(key);
    }
    if let Ok(key) = std::env::var(env_var)
        && !key.is_empty()
    {
        debug!("Backend '{}' using API key from {}", backend, env_var);
        return Ok(key);
    }
    Err(WaypointError::configuration(format!(
        "No API key for backend '{}' (set api_key or {})",
        backend, env_var
    )))
}

/// POST a JSON body and return the decoded JSON response, classifying failures
pub(super) async fn post_json(
    client: &reqwest::Client,
    backend: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    timeout: Duration,
) -> std::result::Result<Value, AdapterError> {
    let mut request = client.post(url).timeout(timeout).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::new(backend, classify_transport(&e), e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        warn!("Backend '{}' returned HTTP {}", backend, status);
        return Err(AdapterError::new(
            backend,
            classify_status(status),
            format!("HTTP {}: {}", status, truncate_str(&text, MAX_ERROR_BODY_LEN)),
        ));
    }

    response.json::<Value>().await.map_err(|e| {
        let kind = if e.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::InvalidResponse
        };
        AdapterError::new(backend, kind, format!("Failed to decode response: {}", e))
    })
}

/// Pull the completion text out of a response body
pub(super) fn extract_text(backend: &str, body: &Value, pointer: &str) -> std::result::Result<String, AdapterError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(
                backend,
                FailureKind::InvalidResponse,
                format!("Response has no text at {}", pointer),
            )
        })
}

pub(super) fn classify_status(status: StatusCode) -> FailureKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Authentication,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        s if s.is_server_error() => FailureKind::Unavailable,
        s if s.is_client_error() => FailureKind::InvalidRequest,
        _ => FailureKind::Other,
    }
}

fn classify_transport(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() || error.is_request() {
        FailureKind::Network
    } else if error.is_decode() {
        FailureKind::InvalidResponse
    } else {
        FailureKind::Other
    }
}

/// Truncate a string to `max_len` characters, appending `...` if truncated
fn truncate_str(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
