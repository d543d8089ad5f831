use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::adapters::{Adapter, AdapterError, GenerateOptions};
use crate::config::RetryConfig;

/// Execute an operation with exponential backoff, retrying only errors `retryable` accepts
pub async fn with_retry<F, Fut, T, E, P>(config: &RetryConfig, retryable: P, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    if config.max_retries == 0 {
        return operation().await;
    }

    let backoff = ExponentialBuilder::default()
        .with_max_times(config.max_retries as usize)
        .with_min_delay(Duration::from_millis(config.initial_interval_ms))
        .with_max_delay(Duration::from_millis(config.max_interval_ms))
        .with_factor(config.multiplier);

    debug!(
        "Starting operation with retry policy: max_retries={}, initial_interval={}ms, max_interval={}ms, multiplier={}",
        config.max_retries, config.initial_interval_ms, config.max_interval_ms, config.multiplier
    );

    let mut attempt = 0;

    (|| {
        attempt += 1;
        let current = attempt;
        let fut = operation();
        async move {
            let result = fut.await;
            if result.is_ok() && current > 1 {
                debug!("Operation succeeded on attempt {}", current);
            }
            result
        }
    })
    .retry(backoff)
    .when(|e: &E| retryable(e))
    .notify(|e: &E, delay: Duration| {
        warn!("Operation failed, retrying in {:?}: {}", delay, e);
    })
    .await
}

/// Wraps an adapter so transient failures are retried against the same backend
/// before the orchestrator sees them.
pub struct RetryingAdapter {
    inner: Arc<dyn Adapter>,
    config: RetryConfig,
}

impl RetryingAdapter {
    pub fn new(inner: Arc<dyn Adapter>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Adapter for RetryingAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AdapterError> {
        with_retry(
            &self.config,
            |e: &AdapterError| e.kind.is_transient(),
            || self.inner.generate(prompt, options),
        )
        .await
    }
}
