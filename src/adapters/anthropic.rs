use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::adapters::http::{self, DEFAULT_TIMEOUT};
use crate::adapters::{
    Adapter, AdapterError, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, GenerateOptions, option_f64,
    option_u64,
};
use crate::router::Backend;

pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API (`/v1/messages`)
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    backend: String,
    model: String,
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    /// Uses `api_key` if given, otherwise `ANTHROPIC_API_KEY`
    pub fn new(backend: &Backend, api_key: Option<String>) -> crate::error::Result<Self> {
        Ok(Self {
            backend: backend.name.clone(),
            model: http::require_model(backend, "Anthropic")?,
            api_key: http::resolve_api_key(api_key, ANTHROPIC_API_KEY_ENV, &backend.name)?,
            endpoint: DEFAULT_ANTHROPIC_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: http::build_client()?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.backend
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError> {
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "max_tokens": option_u64(options, "max_tokens", DEFAULT_MAX_TOKENS),
            "temperature": option_f64(options, "temperature", DEFAULT_TEMPERATURE),
            "messages": [{"role": "user", "content": prompt}],
        });

        debug!("Anthropic request to {} (model {})", url, self.model);
        let response = http::post_json(
            &self.client,
            &self.backend,
            &url,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
            &body,
            self.timeout,
        )
        .await?;
        http::extract_text(&self.backend, &response, "/content/0/text")
    }
}
