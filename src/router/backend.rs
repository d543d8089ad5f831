use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where a backend executes. Anything that is not `local` or `cloud` keeps its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendClass {
    Local,
    Cloud,
    Other(String),
}

impl From<String> for BackendClass {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "cloud" => Self::Cloud,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for BackendClass {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<BackendClass> for String {
    fn from(value: BackendClass) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BackendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
            Self::Other(label) => write!(f, "{}", label),
        }
    }
}

/// A registered execution target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    pub class: BackendClass,
    #[serde(default)]
    pub cost_per_input_token: f64,
    #[serde(default)]
    pub cost_per_output_token: f64,
    /// Relative model strength in [0, 1]; scales the capability sub-score
    #[serde(default = "default_capability")]
    pub capability: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_capability() -> f64 {
    1.0
}

impl Backend {
    pub fn new(name: impl Into<String>, class: impl Into<BackendClass>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            capability: default_capability(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_costs(mut self, per_input_token: f64, per_output_token: f64) -> Self {
        self.cost_per_input_token = per_input_token;
        self.cost_per_output_token = per_output_token;
        self
    }

    pub fn with_capability(mut self, capability: f64) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_local(&self) -> bool {
        self.class == BackendClass::Local
    }

    /// The model identifier adapters send to the backend, if one is configured
    pub fn model(&self) -> Option<&str> {
        self.metadata.get("model").and_then(|v| v.as_str())
    }

    pub fn estimated_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.cost_per_input_token
            + output_tokens as f64 * self.cost_per_output_token
    }

    /// Cost of a nominal 500-in / 500-out request
    pub fn nominal_cost(&self) -> f64 {
        self.estimated_cost(500, 500)
    }
}

/// Insertion-ordered backend registry with unique names.
///
/// Registration order is significant: smart defaults pick the first backend of a
/// class, and multi-factor ties go to the earliest registration. Re-registering a
/// name replaces the entry in place.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
    index: FxHashMap<String, usize>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, returning the entry it replaced (if any)
    pub fn register(&mut self, backend: Backend) -> Option<Backend> {
        if let Some(&position) = self.index.get(&backend.name) {
            return Some(std::mem::replace(&mut self.backends[position], backend));
        }
        self.index.insert(backend.name.clone(), self.backends.len());
        self.backends.push(backend);
        None
    }

    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.index.get(name).map(|&i| &self.backends[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    pub fn first(&self) -> Option<&Backend> {
        self.backends.first()
    }

    pub fn first_of_class(&self, class: &BackendClass) -> Option<&Backend> {
        self.backends.iter().find(|b| &b.class == class)
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl FromIterator<Backend> for BackendRegistry {
    fn from_iter<I: IntoIterator<Item = Backend>>(iter: I) -> Self {
        let mut registry = Self::new();
        for backend in iter {
            registry.register(backend);
        }
        registry
    }
}
