use thiserror::Error;

use crate::adapters::AdapterError;

pub type Result<T> = std::result::Result<T, WaypointError>;

#[derive(Error, Debug)]
pub enum WaypointError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Multi-factor routing found no backend passing the privacy/locality constraints
    #[error("No eligible backend found for the given constraints ({constraints})")]
    NoEligibleBackend { constraints: String },

    /// Policy routing exhausted every policy and default without a backend
    #[error("No suitable backend found for this request")]
    NoBackendSelected,

    /// Adapter failure, passed through untouched so its kind stays inspectable
    #[error(transparent)]
    Backend(#[from] AdapterError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Backend not registered: {0}")]
    UnknownBackend(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl WaypointError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// The adapter failure behind this error, if the error came from a backend call
    pub fn as_backend_failure(&self) -> Option<&AdapterError> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FailureKind;

    #[test]
    fn test_backend_error_is_transparent() {
        let adapter_error = AdapterError::new("openai", FailureKind::RateLimited, "slow down");
        let expected = adapter_error.to_string();
        let error = WaypointError::from(adapter_error);

        assert_eq!(error.to_string(), expected);
        assert_eq!(
            error.as_backend_failure().map(|e| e.kind),
            Some(FailureKind::RateLimited)
        );
    }

    #[test]
    fn test_routing_errors_are_distinguishable() {
        let no_eligible = WaypointError::NoEligibleBackend {
            constraints: "has_pii=true".to_string(),
        };
        let no_selected = WaypointError::NoBackendSelected;

        assert!(matches!(no_eligible, WaypointError::NoEligibleBackend { .. }));
        assert!(no_eligible.to_string().contains("has_pii=true"));
        assert!(matches!(no_selected, WaypointError::NoBackendSelected));
        assert!(no_selected.as_backend_failure().is_none());
    }
}
