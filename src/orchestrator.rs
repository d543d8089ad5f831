//! Dispatch: route a prompt with the active mode, invoke the chosen backend and
//! fall back to a configured alternate when the primary fails.
//!
//! Configuration methods take `&mut self` and `dispatch` takes `&self`, so an
//! orchestrator shared across tasks goes behind an `RwLock` (or is built once and
//! wrapped in an `Arc`) before serving.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::{Adapter, AdapterError, FailureKind, MockAdapter, build_adapter};
use crate::config::{Config, PolicyConfig, PolicyKind};
use crate::error::{Result, WaypointError};
use crate::router::{
    Backend, BackendRegistry, Classification, FactorScore, Hints, KeywordClassifier,
    MultiFactorScorer, Policy, PolicyRouter, PrivacyClassifier, RequestContext, ScoringWeights,
};

/// Metadata value for `classification` when no classification decided the route
pub const DEFAULT_CLASSIFICATION_LABEL: &str = "DEFAULT";

/// Which decision component an orchestrator runs; fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Policy,
    MultiFactor,
}

impl RoutingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingMode::Policy => "policy",
            RoutingMode::MultiFactor => "multi_factor",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Engine {
    Policy(PolicyRouter),
    MultiFactor(MultiFactorScorer),
}

/// Which primary failures hand the request to the fallback backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackTrigger {
    Any,
    Kinds(FxHashSet<FailureKind>),
}

impl FallbackTrigger {
    pub fn kind(kind: FailureKind) -> Self {
        Self::Kinds(std::iter::once(kind).collect())
    }

    pub fn matches(&self, kind: FailureKind) -> bool {
        match self {
            Self::Any => true,
            Self::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

impl FromIterator<FailureKind> for FallbackTrigger {
    /// An empty set of kinds means any failure
    fn from_iter<T: IntoIterator<Item = FailureKind>>(iter: T) -> Self {
        let kinds: FxHashSet<FailureKind> = iter.into_iter().collect();
        if kinds.is_empty() { Self::Any } else { Self::Kinds(kinds) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSpec {
    pub primary: String,
    pub fallback: String,
    pub trigger: FallbackTrigger,
}

impl FallbackSpec {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>, trigger: FallbackTrigger) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            trigger,
        }
    }

    fn applies(&self, failed_backend: &str, error: &AdapterError) -> bool {
        failed_backend == self.primary && self.trigger.matches(error.kind)
    }
}

/// Result of the routing step alone
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub mode: RoutingMode,
    pub backend: String,
    /// Policy mode: the classification that decided the route, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Multi-factor mode: the winning backend's breakdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<FactorScore>,
    /// Multi-factor mode: every backend's breakdown in registration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<FactorScore>,
    pub reason: String,
}

impl RoutingDecision {
    fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("routing_mode".to_string(), json!(self.mode.as_str()));

        match (&self.score, self.mode) {
            (Some(score), RoutingMode::MultiFactor) => {
                metadata.insert("score".to_string(), json!(score.overall));
                metadata.insert("privacy_score".to_string(), json!(score.privacy));
                metadata.insert("cost_score".to_string(), json!(score.cost));
                metadata.insert("capability_score".to_string(), json!(score.capability));
                metadata.insert("latency_score".to_string(), json!(score.latency));
                metadata.insert("estimated_cost".to_string(), json!(score.estimated_cost));
                metadata.insert("reason".to_string(), json!(score.reason));
            }
            _ => {
                let label = self
                    .classification
                    .as_ref()
                    .map_or(DEFAULT_CLASSIFICATION_LABEL, Classification::as_str);
                metadata.insert("classification".to_string(), json!(label));
            }
        }

        metadata
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub content: String,
    /// The backend that produced `content`, after any fallback
    pub backend: String,
    pub was_fallback: bool,
    pub metadata: Map<String, Value>,
}

pub struct Orchestrator {
    engine: Engine,
    registry: BackendRegistry,
    adapters: FxHashMap<String, Arc<dyn Adapter>>,
    fallback: Option<FallbackSpec>,
}

impl Orchestrator {
    /// Classification-driven routing
    pub fn policy() -> Self {
        Self::with_engine(Engine::Policy(PolicyRouter::new()))
    }

    /// Weighted multi-factor routing; `pii_approved` may receive prompts containing PII
    pub fn multi_factor<I, S>(weights: ScoringWeights, pii_approved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_engine(Engine::MultiFactor(MultiFactorScorer::new(weights, pii_approved)))
    }

    fn with_engine(engine: Engine) -> Self {
        Self {
            engine,
            registry: BackendRegistry::new(),
            adapters: FxHashMap::default(),
            fallback: None,
        }
    }

    /// Build a ready orchestrator: backends with their adapters, policies, mapping and fallback
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut orchestrator = match config.routing.mode {
            RoutingMode::Policy => Self::policy(),
            RoutingMode::MultiFactor => Self::multi_factor(
                config.routing.weights,
                config.routing.pii_approved.iter().cloned(),
            ),
        };

        for backend_config in config.backends() {
            let adapter = build_adapter(backend_config)?;
            orchestrator.add_backend(backend_config.to_backend(), Some(adapter));
        }

        if let Engine::Policy(router) = &mut orchestrator.engine {
            for policy_config in &config.policies {
                router.add_policy(policy_from_config(policy_config));
            }
            for (classification, backend) in &config.routing.classifications {
                router.map_classification(classification.as_str(), backend.as_str());
            }
        }

        if let Some(fallback) = &config.fallback {
            orchestrator.set_fallback(FallbackSpec::new(
                &fallback.primary,
                &fallback.fallback,
                fallback.on.iter().copied().collect(),
            ))?;
        }

        info!(
            "Orchestrator ready: mode={}, backends={}",
            orchestrator.mode(),
            orchestrator.registry.len()
        );
        Ok(orchestrator)
    }

    pub fn mode(&self) -> RoutingMode {
        match self.engine {
            Engine::Policy(_) => RoutingMode::Policy,
            Engine::MultiFactor(_) => RoutingMode::MultiFactor,
        }
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Register a backend; without an adapter it gets a [`MockAdapter`]
    pub fn add_backend(&mut self, backend: Backend, adapter: Option<Arc<dyn Adapter>>) {
        let adapter = adapter.unwrap_or_else(|| Arc::new(MockAdapter::new(&backend.name)));
        self.adapters.insert(backend.name.clone(), adapter);
        if let Some(previous) = self.registry.register(backend) {
            warn!("Backend '{}' re-registered, replacing previous entry", previous.name);
        }
    }

    /// Append a policy; ignored in multi-factor mode
    pub fn add_policy(&mut self, policy: Policy) {
        match &mut self.engine {
            Engine::Policy(router) => router.add_policy(policy),
            Engine::MultiFactor(_) => warn!("Ignoring policy: orchestrator is in multi-factor mode"),
        }
    }

    /// Pin a classification to a backend; ignored in multi-factor mode
    pub fn map_classification(&mut self, classification: impl Into<Classification>, backend: impl Into<String>) {
        match &mut self.engine {
            Engine::Policy(router) => router.map_classification(classification, backend),
            Engine::MultiFactor(_) => {
                warn!("Ignoring classification mapping: orchestrator is in multi-factor mode")
            }
        }
    }

    /// Allow a backend to receive PII in multi-factor mode
    pub fn approve_for_pii(&mut self, backend: impl Into<String>) {
        match &mut self.engine {
            Engine::MultiFactor(scorer) => scorer.approve_for_pii(backend),
            Engine::Policy(_) => warn!("Ignoring PII approval: orchestrator is in policy mode"),
        }
    }

    /// Replace the fallback; both backends must already be registered
    pub fn set_fallback(&mut self, fallback: FallbackSpec) -> Result<()> {
        for name in [&fallback.primary, &fallback.fallback] {
            if !self.registry.contains(name) {
                return Err(WaypointError::UnknownBackend(name.clone()));
            }
        }
        debug!(
            "Fallback configured: {} -> {} ({:?})",
            fallback.primary, fallback.fallback, fallback.trigger
        );
        self.fallback = Some(fallback);
        Ok(())
    }

    pub fn fallback(&self) -> Option<&FallbackSpec> {
        self.fallback.as_ref()
    }

    /// Current scorer weights; `None` in policy mode
    pub fn scoring_weights(&self) -> Option<ScoringWeights> {
        match &self.engine {
            Engine::MultiFactor(scorer) => Some(scorer.weights()),
            Engine::Policy(_) => None,
        }
    }

    pub fn set_scoring_weights(&mut self, weights: ScoringWeights) -> Result<()> {
        weights.validate()?;
        match &mut self.engine {
            Engine::MultiFactor(scorer) => {
                scorer.set_weights(weights);
                Ok(())
            }
            Engine::Policy(_) => Err(WaypointError::configuration(
                "scoring weights only apply in multi-factor mode",
            )),
        }
    }

    /// Run only the routing step
    pub fn explain(&self, prompt: &str, hints: &Hints) -> Result<RoutingDecision> {
        match &self.engine {
            Engine::Policy(router) => {
                let decision = router
                    .decide(&self.registry, prompt)
                    .ok_or(WaypointError::NoBackendSelected)?;
                Ok(RoutingDecision {
                    mode: RoutingMode::Policy,
                    backend: decision.backend,
                    classification: decision.classification,
                    score: None,
                    candidates: Vec::new(),
                    reason: decision.reason,
                })
            }
            Engine::MultiFactor(scorer) => {
                let (backend, score) = scorer.route(&self.registry, prompt, hints)?;
                let context = RequestContext::analyze(prompt, hints);
                Ok(RoutingDecision {
                    mode: RoutingMode::MultiFactor,
                    backend,
                    classification: None,
                    reason: score.reason.clone(),
                    candidates: scorer.score_all(&self.registry, &context),
                    score: Some(score),
                })
            }
        }
    }

    pub async fn dispatch(&self, prompt: &str, hints: &Hints) -> Result<Response> {
        let decision = self.select(prompt, hints)?;
        let mut metadata = decision.metadata();
        let selected = decision.backend;

        let adapter = self.adapter(&selected)?;
        info!("Dispatching to backend '{}' ({} mode)", selected, self.mode());

        let error = match adapter.generate(prompt, &hints.options).await {
            Ok(content) => {
                return Ok(Response {
                    content,
                    backend: selected,
                    was_fallback: false,
                    metadata,
                });
            }
            Err(error) => error,
        };

        let Some(fallback) = self
            .fallback
            .as_ref()
            .filter(|f| f.applies(&selected, &error))
        else {
            warn!("Backend '{}' failed with no applicable fallback: {}", selected, error);
            return Err(error.into());
        };

        warn!(
            "Backend '{}' failed ({}), falling back to '{}'",
            selected, error.kind, fallback.fallback
        );
        let fallback_adapter = self.adapter(&fallback.fallback)?;
        let content = fallback_adapter
            .generate(prompt, &hints.options)
            .await
            .inspect_err(|e| warn!("Fallback backend '{}' failed too: {}", fallback.fallback, e))?;

        metadata.insert("fallback_reason".to_string(), json!(error.to_string()));
        Ok(Response {
            content,
            backend: fallback.fallback.clone(),
            was_fallback: true,
            metadata,
        })
    }

    /// Routing for dispatch: policy mode skips the candidate breakdown
    fn select(&self, prompt: &str, hints: &Hints) -> Result<RoutingDecision> {
        match &self.engine {
            Engine::Policy(_) => self.explain(prompt, hints),
            Engine::MultiFactor(scorer) => {
                let (backend, score) = scorer.route(&self.registry, prompt, hints)?;
                Ok(RoutingDecision {
                    mode: RoutingMode::MultiFactor,
                    backend,
                    classification: None,
                    reason: score.reason.clone(),
                    candidates: Vec::new(),
                    score: Some(score),
                })
            }
        }
    }

    fn adapter(&self, backend: &str) -> Result<&Arc<dyn Adapter>> {
        self.adapters
            .get(backend)
            .ok_or_else(|| WaypointError::UnknownBackend(backend.to_string()))
    }
}

fn policy_from_config(config: &PolicyConfig) -> Policy {
    let policy = match config.kind {
        PolicyKind::Privacy => Policy::new(PrivacyClassifier, config.enforcement),
        PolicyKind::Keyword => {
            let on_match = config
                .classification
                .clone()
                .unwrap_or_else(|| Classification::PUBLIC.to_string());
            let otherwise = config
                .otherwise
                .clone()
                .unwrap_or_else(|| Classification::PUBLIC.to_string());
            Policy::new(
                KeywordClassifier::new(config.keywords.iter().cloned(), on_match, otherwise),
                config.enforcement,
            )
        }
    };

    config
        .metadata
        .iter()
        .fold(policy, |policy, (key, value)| policy.with_metadata(key.clone(), value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Enforcement, Request};

    fn policy_orchestrator() -> Orchestrator {
        let mut orchestrator = Orchestrator::policy();
        orchestrator.add_backend(Backend::new("local", "local"), None);
        orchestrator.add_backend(Backend::new("cloud", "cloud").with_costs(0.00001, 0.00003), None);
        orchestrator.add_policy(Policy::strict(PrivacyClassifier));
        orchestrator
    }

    #[tokio::test]
    async fn test_policy_dispatch_pii_goes_local() {
        let orchestrator = policy_orchestrator();
        let response = orchestrator
            .dispatch("My SSN is 123-45-6789", &Hints::new())
            .await
            .unwrap();

        assert_eq!(response.backend, "local");
        assert!(!response.was_fallback);
        assert_eq!(response.metadata["routing_mode"], "policy");
        assert_eq!(response.metadata["classification"], "RESTRICTED");
    }

    #[tokio::test]
    async fn test_policy_dispatch_public_goes_cloud() {
        let orchestrator = policy_orchestrator();
        let response = orchestrator
            .dispatch("What is the weather today?", &Hints::new())
            .await
            .unwrap();

        assert_eq!(response.backend, "cloud");
        assert_eq!(response.content, "Mock response from cloud: What is the weather today?");
        assert_eq!(response.metadata["classification"], "PUBLIC");
    }

    #[tokio::test]
    async fn test_default_route_labelled_default() {
        let mut orchestrator = Orchestrator::policy();
        orchestrator.add_backend(Backend::new("only", "cloud"), None);

        let response = orchestrator.dispatch("hello", &Hints::new()).await.unwrap();
        assert_eq!(response.backend, "only");
        assert_eq!(response.metadata["classification"], DEFAULT_CLASSIFICATION_LABEL);
    }

    #[tokio::test]
    async fn test_no_backends_is_no_backend_selected() {
        let orchestrator = Orchestrator::policy();
        let result = orchestrator.dispatch("hello", &Hints::new()).await;
        assert!(matches!(result, Err(WaypointError::NoBackendSelected)));
    }

    #[tokio::test]
    async fn test_multi_factor_metadata() {
        let mut orchestrator = Orchestrator::multi_factor(ScoringWeights::DEFAULT, ["local"]);
        orchestrator.add_backend(Backend::new("local", "local"), None);
        orchestrator.add_backend(Backend::new("cloud", "cloud").with_costs(0.00001, 0.00003), None);

        let response = orchestrator
            .dispatch("What is Rust?", &Hints::new())
            .await
            .unwrap();

        assert_eq!(response.backend, "local");
        assert_eq!(response.metadata["routing_mode"], "multi_factor");
        for key in [
            "score",
            "privacy_score",
            "cost_score",
            "capability_score",
            "latency_score",
            "estimated_cost",
            "reason",
        ] {
            assert!(response.metadata.contains_key(key), "missing {}", key);
        }
        assert!(!response.metadata.contains_key("classification"));
    }

    #[tokio::test]
    async fn test_multi_factor_no_eligible() {
        let mut orchestrator = Orchestrator::multi_factor(ScoringWeights::DEFAULT, Vec::<String>::new());
        orchestrator.add_backend(Backend::new("cloud", "cloud"), None);

        let result = orchestrator
            .dispatch("email me at a@example.com", &Hints::new())
            .await;
        assert!(matches!(result, Err(WaypointError::NoEligibleBackend { .. })));
    }

    #[tokio::test]
    async fn test_fallback_on_matching_kind() {
        let mut orchestrator = Orchestrator::policy();
        orchestrator.add_backend(
            Backend::new("primary", "cloud"),
            Some(Arc::new(MockAdapter::failing("primary", FailureKind::Timeout))),
        );
        orchestrator.add_backend(Backend::new("backup", "local"), None);
        orchestrator
            .set_fallback(FallbackSpec::new(
                "primary",
                "backup",
                FallbackTrigger::kind(FailureKind::Timeout),
            ))
            .unwrap();

        let response = orchestrator.dispatch("hello", &Hints::new()).await.unwrap();
        assert!(response.was_fallback);
        assert_eq!(response.backend, "backup");
        assert_eq!(response.content, "Mock response from backup: hello");
        let reason = response.metadata["fallback_reason"].as_str().unwrap();
        assert!(reason.contains("timeout"));
    }

    #[tokio::test]
    async fn test_fallback_kind_mismatch_propagates() {
        let mut orchestrator = Orchestrator::policy();
        orchestrator.add_backend(
            Backend::new("primary", "cloud"),
            Some(Arc::new(MockAdapter::failing("primary", FailureKind::Authentication))),
        );
        orchestrator.add_backend(Backend::new("backup", "local"), None);
        orchestrator
            .set_fallback(FallbackSpec::new(
                "primary",
                "backup",
                FallbackTrigger::kind(FailureKind::Timeout),
            ))
            .unwrap();

        let error = orchestrator.dispatch("hello", &Hints::new()).await.unwrap_err();
        let failure = error.as_backend_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Authentication);
        assert_eq!(failure.backend, "primary");
    }

    #[test]
    fn test_set_fallback_unknown_backend() {
        let mut orchestrator = policy_orchestrator();
        let result = orchestrator.set_fallback(FallbackSpec::new("local", "missing", FallbackTrigger::Any));
        assert!(matches!(result, Err(WaypointError::UnknownBackend(name)) if name == "missing"));
    }

    #[test]
    fn test_trigger_from_kinds() {
        let any: FallbackTrigger = Vec::new().into_iter().collect();
        assert_eq!(any, FallbackTrigger::Any);
        assert!(any.matches(FailureKind::Other));

        let some: FallbackTrigger = [FailureKind::RateLimited, FailureKind::Timeout].into_iter().collect();
        assert!(some.matches(FailureKind::Timeout));
        assert!(!some.matches(FailureKind::Network));
    }

    #[test]
    fn test_scoring_weights_by_mode() {
        let mut policy = policy_orchestrator();
        assert_eq!(policy.scoring_weights(), None);
        assert!(policy.set_scoring_weights(ScoringWeights::DEFAULT).is_err());

        let mut scored = Orchestrator::multi_factor(ScoringWeights::DEFAULT, Vec::<String>::new());
        let weights = ScoringWeights {
            privacy: 1.0,
            cost: 0.0,
            capability: 0.0,
            latency: 0.0,
        };
        scored.set_scoring_weights(weights).unwrap();
        assert_eq!(scored.scoring_weights(), Some(weights));
    }

    #[test]
    fn test_explain_lists_every_candidate() {
        let mut orchestrator = Orchestrator::multi_factor(ScoringWeights::DEFAULT, Vec::<String>::new());
        orchestrator.add_backend(Backend::new("local", "local"), None);
        orchestrator.add_backend(Backend::new("cloud", "cloud"), None);

        let decision = orchestrator.explain("What is Rust?", &Hints::new()).unwrap();
        assert_eq!(decision.mode, RoutingMode::MultiFactor);
        assert_eq!(decision.candidates.len(), 2);
        assert_eq!(decision.candidates[0].backend, "local");
        assert!(decision.score.is_some());
    }

    #[test]
    fn test_explicit_mapping_beats_default() {
        let mut orchestrator = policy_orchestrator();
        orchestrator.add_backend(Backend::new("vault", "other"), None);
        orchestrator.map_classification(Classification::RESTRICTED, "vault");
        orchestrator.add_policy(Policy::new(
            |_: &Request| Classification::public(),
            Enforcement::Advisory,
        ));

        let decision = orchestrator
            .explain("SSN 123-45-6789", &Hints::new())
            .unwrap();
        assert_eq!(decision.backend, "vault");
        assert_eq!(decision.classification, Some(Classification::restricted()));
    }
}
