use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::adapters::{
    Adapter, AnthropicAdapter, GeminiAdapter, MockAdapter, OllamaAdapter, OpenAiAdapter,
};
use crate::config::{AdapterKind, BackendConfig};
use crate::error::Result;
use crate::retry::RetryingAdapter;

/// Build the adapter a backend config asks for, wrapped in retries when configured
pub fn build_adapter(config: &BackendConfig) -> Result<Arc<dyn Adapter>> {
    let backend = config.to_backend();
    let timeout = config.timeout_secs.map(Duration::from_secs);

    let adapter: Arc<dyn Adapter> = match config.adapter {
        AdapterKind::Mock => Arc::new(MockAdapter::new(&backend.name)),
        AdapterKind::Ollama => {
            let mut adapter = OllamaAdapter::new(&backend)?;
            if let Some(endpoint) = &config.endpoint {
                adapter = adapter.with_endpoint(endpoint);
            }
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Arc::new(adapter)
        }
        AdapterKind::Openai => {
            let mut adapter = OpenAiAdapter::new(&backend, config.api_key.clone())?;
            if let Some(endpoint) = &config.endpoint {
                adapter = adapter.with_endpoint(endpoint);
            }
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Arc::new(adapter)
        }
        AdapterKind::Anthropic => {
            let mut adapter = AnthropicAdapter::new(&backend, config.api_key.clone())?;
            if let Some(endpoint) = &config.endpoint {
                adapter = adapter.with_endpoint(endpoint);
            }
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Arc::new(adapter)
        }
        AdapterKind::Gemini => {
            let mut adapter = GeminiAdapter::new(&backend, config.api_key.clone())?;
            if let Some(endpoint) = &config.endpoint {
                adapter = adapter.with_endpoint(endpoint);
            }
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Arc::new(adapter)
        }
    };

    debug!(
        "Built {:?} adapter for backend '{}' (retries: {})",
        config.adapter, backend.name, config.retry.max_retries
    );

    if config.retry.max_retries > 0 {
        Ok(Arc::new(RetryingAdapter::new(adapter, config.retry.clone())))
    } else {
        Ok(adapter)
    }
}
