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

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Google Gemini `generateContent`
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    backend: String,
    model: String,
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiAdapter {
    /// Uses `api_key` if given, otherwise `GEMINI_API_KEY`
    pub fn new(backend: &Backend, api_key: Option<String>) -> crate::error::Result<Self> {
        Ok(Self {
            backend: backend.name.clone(),
            model: http::require_model(backend, "Gemini")?,
            api_key: http::resolve_api_key(api_key, GEMINI_API_KEY_ENV, &backend.name)?,
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
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
impl Adapter for GeminiAdapter {
    fn name(&self) -> &str {
        &self.backend
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": option_f64(options, "temperature", DEFAULT_TEMPERATURE),
                "maxOutputTokens": option_u64(options, "max_tokens", DEFAULT_MAX_TOKENS),
            },
        });

        debug!("Gemini request to {} (model {})", url, self.model);
        let response = http::post_json(
            &self.client,
            &self.backend,
            &url,
            &[("x-goog-api-key", self.api_key.as_str())],
            &body,
            self.timeout,
        )
        .await?;
        http::extract_text(&self.backend, &response, "/candidates/0/content/parts/0/text")
    }
}
