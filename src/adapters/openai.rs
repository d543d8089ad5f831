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

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible chat completions (`/v1/chat/completions`)
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    backend: String,
    model: String,
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Uses `api_key` if given, otherwise `OPENAI_API_KEY`
    pub fn new(backend: &Backend, api_key: Option<String>) -> crate::error::Result<Self> {
        Ok(Self {
            backend: backend.name.clone(),
            model: http::require_model(backend, "OpenAI")?,
            api_key: http::resolve_api_key(api_key, OPENAI_API_KEY_ENV, &backend.name)?,
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
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
impl Adapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.backend
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError> {
        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": option_f64(options, "temperature", DEFAULT_TEMPERATURE),
            "max_tokens": option_u64(options, "max_tokens", DEFAULT_MAX_TOKENS),
        });
        let authorization = format!("Bearer {}", self.api_key);

        debug!("OpenAI request to {} (model {})", url, self.model);
        let response = http::post_json(
            &self.client,
            &self.backend,
            &url,
            &[("authorization", authorization.as_str())],
            &body,
            self.timeout,
        )
        .await?;
        http::extract_text(&self.backend, &response, "/choices/0/message/content")
    }
}
