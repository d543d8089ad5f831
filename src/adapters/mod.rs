//! Backend adapters: the only place a dispatch leaves the process.
//!
//! Every failure carries a [`FailureKind`] so fallback rules can match on it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use factory::build_adapter;
pub use gemini::GeminiAdapter;
pub use mock::MockAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

/// Free-form generation options (`temperature`, `max_tokens`, ...)
pub type GenerateOptions = serde_json::Map<String, serde_json::Value>;

pub(crate) const DEFAULT_TEMPERATURE: f64 = 0.7;
pub(crate) const DEFAULT_MAX_TOKENS: u64 = 1000;

/// Why a backend call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Unavailable,
    Authentication,
    InvalidRequest,
    InvalidResponse,
    Network,
    Other,
}

impl FailureKind {
    /// Failures worth retrying against the same backend
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::RateLimited
                | FailureKind::Unavailable
                | FailureKind::Network
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Authentication => "authentication",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Network => "network",
            FailureKind::Other => "other",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Backend '{backend}' failed ({kind}): {message}")]
pub struct AdapterError {
    pub backend: String,
    pub kind: FailureKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(backend: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Performs the actual call to one backend
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Name of the backend this adapter talks to
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError>;
}

pub(crate) fn option_f64(options: &GenerateOptions, key: &str, default: f64) -> f64 {
    options.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub(crate) fn option_u64(options: &GenerateOptions, key: &str, default: u64) -> u64 {
    options.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}
