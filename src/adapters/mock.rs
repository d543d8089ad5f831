use async_trait::async_trait;

use crate::adapters::{Adapter, AdapterError, FailureKind, GenerateOptions};

/// In-process adapter for tests and dry runs.
///
/// Echoes the prompt, renders a `{prompt}`/`{backend}` template, or fails every
/// call with a fixed kind.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    backend: String,
    template: Option<String>,
    failure: Option<FailureKind>,
}

impl MockAdapter {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            template: None,
            failure: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Make every call fail with `kind`
    pub fn failing(backend: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::new(backend)
        }
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.backend
    }

    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, AdapterError> {
        if let Some(kind) = self.failure {
            return Err(AdapterError::new(
                &self.backend,
                kind,
                "mock backend configured to fail",
            ));
        }

        Ok(match &self.template {
            Some(template) => template
                .replace("{prompt}", prompt)
                .replace("{backend}", &self.backend),
            None => format!("Mock response from {}: {}", self.backend, prompt),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_response() {
        let adapter = MockAdapter::new("local");
        let content = adapter.generate("hi", &GenerateOptions::new()).await.unwrap();
        assert_eq!(content, "Mock response from local: hi");
    }

    #[tokio::test]
    async fn test_template_response() {
        let adapter = MockAdapter::new("local").with_template("[{backend}] {prompt}!");
        let content = adapter.generate("hi", &GenerateOptions::new()).await.unwrap();
        assert_eq!(content, "[local] hi!");
    }

    #[tokio::test]
    async fn test_failing_adapter() {
        let adapter = MockAdapter::failing("cloud", FailureKind::Unavailable);
        let error = adapter.generate("hi", &GenerateOptions::new()).await.unwrap_err();
        assert_eq!(error.kind, FailureKind::Unavailable);
        assert_eq!(error.backend, "cloud");
    }
}
