use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::adapters::http::{self, DEFAULT_TIMEOUT};
use crate::adapters::{Adapter, AdapterError, DEFAULT_TEMPERATURE, GenerateOptions, option_f64};
use crate::router::Backend;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Local inference through an Ollama server (`/api/generate`, non-streaming)
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    backend: String,
    model: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new(backend: &Backend) -> crate::error::Result<Self> {
        Ok(Self {
            backend: backend.name.clone(),
            model: http::require_model(backend, "Ollama")?,
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
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

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Adapter for OllamaAdapter {
    fn name(&self) -> &str {
        &self.backend
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": option_f64(options, "temperature", DEFAULT_TEMPERATURE),
            },
        });
        if let Some(max_tokens) = options.get("max_tokens") {
            body["options"]["num_predict"] = max_tokens.clone();
        }

        debug!("Ollama request to {} (model {})", url, self.model);
        let response = http::post_json(&self.client, &self.backend, &url, &[], &body, self.timeout).await?;
        http::extract_text(&self.backend, &response, "/response")
    }
}
