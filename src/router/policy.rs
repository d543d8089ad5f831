//! Ordered, first-match policy routing.
//!
//! Policies classify a request; the classification is resolved to a backend
//! through the explicit mapping table or, for the well-known labels, a smart
//! default. Strict RESTRICTED/PRIVATE pins to a local backend. Strict PUBLIC is
//! deferred so a later policy can still override it, and resolves to the first
//! cloud backend only after every policy has run.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::router::backend::{BackendClass, BackendRegistry};

/// Opaque label produced by a policy rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(String);

impl Classification {
    pub const RESTRICTED: &'static str = "RESTRICTED";
    pub const PRIVATE: &'static str = "PRIVATE";
    pub const PUBLIC: &'static str = "PUBLIC";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn restricted() -> Self {
        Self::new(Self::RESTRICTED)
    }

    pub fn private() -> Self {
        Self::new(Self::PRIVATE)
    }

    pub fn public() -> Self {
        Self::new(Self::PUBLIC)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// RESTRICTED and PRIVATE must stay on a local backend
    pub fn requires_local(&self) -> bool {
        self.0 == Self::RESTRICTED || self.0 == Self::PRIVATE
    }

    pub fn is_public(&self) -> bool {
        self.0 == Self::PUBLIC
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Classification {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Classification {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// The request a classifier sees
#[derive(Debug, Clone)]
pub struct Request {
    pub prompt: String,
    pub metadata: HashMap<String, String>,
}

impl Request {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A policy rule: maps a request to a classification
pub trait Classifier: Send + Sync {
    fn classify(&self, request: &Request) -> Classification;

    /// Name used in logs
    fn name(&self) -> &str {
        "classifier"
    }
}

impl<F> Classifier for F
where
    F: Fn(&Request) -> Classification + Send + Sync,
{
    fn classify(&self, request: &Request) -> Classification {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    #[default]
    Strict,
    Advisory,
}

#[derive(Clone)]
pub struct Policy {
    pub classifier: Arc<dyn Classifier>,
    pub enforcement: Enforcement,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Policy {
    pub fn new(classifier: impl Classifier + 'static, enforcement: Enforcement) -> Self {
        Self {
            classifier: Arc::new(classifier),
            enforcement,
            metadata: HashMap::new(),
        }
    }

    pub fn strict(classifier: impl Classifier + 'static) -> Self {
        Self::new(classifier, Enforcement::Strict)
    }

    pub fn advisory(classifier: impl Classifier + 'static) -> Self {
        Self::new(classifier, Enforcement::Advisory)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("classifier", &self.classifier.name())
            .field("enforcement", &self.enforcement)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Outcome of policy routing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub backend: String,
    /// The classification that decided the route; `None` for the registry default
    pub classification: Option<Classification>,
    pub reason: String,
}

impl PolicyDecision {
    fn new(backend: &str, classification: Option<Classification>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.to_string(),
            classification,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyRouter {
    policies: Vec<Policy>,
    mapping: FxHashMap<Classification, String>,
}

impl PolicyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a policy; registration order is evaluation order
    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    pub fn map_classification(&mut self, classification: impl Into<Classification>, backend: impl Into<String>) {
        self.mapping.insert(classification.into(), backend.into());
    }

    pub fn mapping(&self) -> impl Iterator<Item = (&Classification, &String)> {
        self.mapping.iter()
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn route(&self, backends: &BackendRegistry, prompt: &str) -> Option<String> {
        self.decide(backends, prompt).map(|d| d.backend)
    }

    pub fn decide(&self, backends: &BackendRegistry, prompt: &str) -> Option<PolicyDecision> {
        let request = Request::new(prompt);
        let mut deferred_public: Option<Classification> = None;

        for policy in &self.policies {
            let classification = policy.classifier.classify(&request);
            debug!(
                "Policy '{}' ({:?}) classified request as {}",
                policy.classifier.name(),
                policy.enforcement,
                classification
            );

            if let Some(backend) = self.mapping.get(&classification) {
                return Some(PolicyDecision::new(
                    backend,
                    Some(classification),
                    "explicit classification mapping",
                ));
            }

            if policy.enforcement == Enforcement::Advisory {
                continue;
            }

            if classification.requires_local() {
                if let Some(local) = backends.first_of_class(&BackendClass::Local) {
                    return Some(PolicyDecision::new(
                        &local.name,
                        Some(classification),
                        "sensitive classification pinned to local backend",
                    ));
                }
                debug!(
                    "No local backend registered for {}, continuing with next policy",
                    classification
                );
            } else if classification.is_public() {
                deferred_public = Some(classification);
            }
        }

        if let Some(public) = deferred_public
            && let Some(cloud) = backends.first_of_class(&BackendClass::Cloud)
        {
            return Some(PolicyDecision::new(
                &cloud.name,
                Some(public),
                "public classification defaulted to cloud backend",
            ));
        }

        backends
            .first()
            .map(|b| PolicyDecision::new(&b.name, None, "first registered backend"))
    }
}
