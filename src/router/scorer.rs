//! Multi-factor backend scoring.
//!
//! Every backend is scored on privacy, cost, capability and latency. Privacy is a
//! hard constraint: a violation makes the backend ineligible and zeroes every
//! sub-score. Cost and latency ceilings only zero their own sub-score.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapters::GenerateOptions;
use crate::error::{Result, WaypointError};
use crate::router::backend::{Backend, BackendClass, BackendRegistry};
use crate::router::complexity::{Complexity, ComplexityClassifier, token_count};
use crate::router::pii::PiiScanner;

/// Cost at or above which the cost sub-score bottoms out
pub const MAX_REASONABLE_COST: f64 = 0.10;
/// Latency at or above which the latency sub-score bottoms out
pub const MAX_ACCEPTABLE_LATENCY_MS: u64 = 5000;

const LOCAL_LATENCY_MS: u64 = 500;
const REMOTE_LATENCY_MS: u64 = 1500;

const FULL_SCORE: f64 = 100.0;

/// Factor weights. Not normalized: the overall score is the weighted sum as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub privacy: f64,
    pub cost: f64,
    pub capability: f64,
    pub latency: f64,
}

impl ScoringWeights {
    pub const DEFAULT: ScoringWeights = ScoringWeights {
        privacy: 0.40,
        cost: 0.25,
        capability: 0.25,
        latency: 0.10,
    };

    pub fn validate(&self) -> Result<()> {
        let all = [
            ("privacy", self.privacy),
            ("cost", self.cost),
            ("capability", self.capability),
            ("latency", self.latency),
        ];
        for (factor, weight) in all {
            if !weight.is_finite() || weight < 0.0 {
                return Err(WaypointError::configuration(format!(
                    "weight for '{}' must be a non-negative number, got {}",
                    factor, weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-call hints. Constraints only affect multi-factor routing; `options` are
/// forwarded to the adapter in either mode.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub require_local: bool,
    pub options: GenerateOptions,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn require_local(mut self) -> Self {
        self.require_local = true;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Everything the scorer knows about one request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub prompt: String,
    pub has_pii: bool,
    pub complexity: Complexity,
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub require_local: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl RequestContext {
    /// Derive PII presence, complexity and token estimates from the prompt
    pub fn analyze(prompt: &str, hints: &Hints) -> Self {
        let complexity = ComplexityClassifier::classify(prompt);
        let input_tokens = token_count(prompt) as u64;

        Self {
            prompt: prompt.to_string(),
            has_pii: PiiScanner::has_pii(prompt),
            complexity,
            max_cost: hints.max_cost,
            max_latency_ms: hints.max_latency_ms,
            require_local: hints.require_local,
            input_tokens,
            output_tokens: input_tokens * complexity.output_multiplier(),
        }
    }

    fn describe_constraints(&self) -> String {
        format!(
            "has_pii={}, require_local={}",
            self.has_pii, self.require_local
        )
    }
}

/// Score breakdown for one backend against one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScore {
    pub backend: String,
    pub overall: f64,
    pub privacy: f64,
    pub cost: f64,
    pub capability: f64,
    pub latency: f64,
    pub eligible: bool,
    pub estimated_cost: f64,
    pub reason: String,
}

impl FactorScore {
    fn ineligible(backend: &Backend, estimated_cost: f64, reason: String) -> Self {
        Self {
            backend: backend.name.clone(),
            overall: 0.0,
            privacy: 0.0,
            cost: 0.0,
            capability: 0.0,
            latency: 0.0,
            eligible: false,
            estimated_cost,
            reason,
        }
    }
}

/// Weighted four-factor scorer
#[derive(Debug, Clone, Default)]
pub struct MultiFactorScorer {
    weights: ScoringWeights,
    pii_approved: FxHashSet<String>,
}

impl MultiFactorScorer {
    pub fn new<I, S>(weights: ScoringWeights, pii_approved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            weights,
            pii_approved: pii_approved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn set_weights(&mut self, weights: ScoringWeights) {
        self.weights = weights;
    }

    pub fn approve_for_pii(&mut self, backend: impl Into<String>) {
        self.pii_approved.insert(backend.into());
    }

    pub fn is_pii_approved(&self, backend: &str) -> bool {
        self.pii_approved.contains(backend)
    }

    pub fn score(&self, backend: &Backend, context: &RequestContext) -> FactorScore {
        let estimated_cost = backend.estimated_cost(context.input_tokens, context.output_tokens);

        if let Some(violation) = self.privacy_violation(backend, context) {
            return FactorScore::ineligible(
                backend,
                estimated_cost,
                format!("privacy constraint violated ({})", violation),
            );
        }

        let privacy = FULL_SCORE;
        let cost = score_cost(estimated_cost, context.max_cost);
        let capability = score_capability(backend, context.complexity);
        let latency = score_latency(&backend.class, context.max_latency_ms);

        let overall = privacy * self.weights.privacy
            + cost * self.weights.cost
            + capability * self.weights.capability
            + latency * self.weights.latency;

        FactorScore {
            backend: backend.name.clone(),
            overall,
            privacy,
            cost,
            capability,
            latency,
            eligible: true,
            estimated_cost,
            reason: format!("Optimal for {} complexity queries", context.complexity),
        }
    }

    /// Scores for every registered backend, in registration order
    pub fn score_all(&self, backends: &BackendRegistry, context: &RequestContext) -> Vec<FactorScore> {
        backends.iter().map(|b| self.score(b, context)).collect()
    }

    /// Pick the highest-scoring eligible backend; ties go to the earliest registration
    pub fn route(
        &self,
        backends: &BackendRegistry,
        prompt: &str,
        hints: &Hints,
    ) -> Result<(String, FactorScore)> {
        let context = RequestContext::analyze(prompt, hints);
        debug!(
            has_pii = context.has_pii,
            complexity = %context.complexity,
            input_tokens = context.input_tokens,
            output_tokens = context.output_tokens,
            "Scoring {} backends",
            backends.len()
        );

        let mut best: Option<FactorScore> = None;
        for score in self.score_all(backends, &context) {
            debug!(
                backend = %score.backend,
                eligible = score.eligible,
                overall = score.overall,
                "{}",
                score.reason
            );
            if !score.eligible {
                continue;
            }
            if best.as_ref().is_none_or(|b| score.overall > b.overall) {
                best = Some(score);
            }
        }

        match best {
            Some(score) => {
                info!(
                    "Multi-factor routing selected {} (score {:.2})",
                    score.backend, score.overall
                );
                Ok((score.backend.clone(), score))
            }
            None => Err(WaypointError::NoEligibleBackend {
                constraints: context.describe_constraints(),
            }),
        }
    }

    fn privacy_violation(&self, backend: &Backend, context: &RequestContext) -> Option<&'static str> {
        if context.has_pii && !self.is_pii_approved(&backend.name) {
            return Some("PII detected, backend not approved");
        }
        if context.require_local && !backend.is_local() {
            return Some("local execution required");
        }
        None
    }
}

fn score_cost(estimated_cost: f64, max_cost: Option<f64>) -> f64 {
    if let Some(max_cost) = max_cost
        && estimated_cost > max_cost
    {
        return 0.0;
    }
    if estimated_cost == 0.0 {
        return FULL_SCORE;
    }
    (1.0 - (estimated_cost / MAX_REASONABLE_COST).min(1.0)) * FULL_SCORE
}

fn score_capability(backend: &Backend, complexity: Complexity) -> f64 {
    let base = match (complexity, &backend.class) {
        (Complexity::Simple, BackendClass::Local) => 100.0,
        (Complexity::Simple, _) => 85.0,
        (Complexity::Moderate, BackendClass::Cloud) => 90.0,
        (Complexity::Moderate, _) => 85.0,
        (Complexity::Complex, BackendClass::Cloud) => 100.0,
        (Complexity::Complex, _) => 70.0,
    };
    base * backend.capability
}

/// Static latency estimate by backend class
pub fn estimated_latency_ms(class: &BackendClass) -> u64 {
    match class {
        BackendClass::Local => LOCAL_LATENCY_MS,
        _ => REMOTE_LATENCY_MS,
    }
}

fn score_latency(class: &BackendClass, max_latency_ms: Option<u64>) -> f64 {
    let latency = estimated_latency_ms(class);
    if let Some(max_latency_ms) = max_latency_ms
        && latency > max_latency_ms
    {
        return 0.0;
    }
    let ratio = (latency as f64 / MAX_ACCEPTABLE_LATENCY_MS as f64).min(1.0);
    (1.0 - ratio) * FULL_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn context(prompt: &str) -> RequestContext {
        RequestContext::analyze(prompt, &Hints::default())
    }

    fn local() -> Backend {
        Backend::new("ollama", "local")
    }

    fn cloud() -> Backend {
        Backend::new("openai", "cloud").with_costs(0.00001, 0.00003)
    }

    #[test]
    fn test_context_derivation() {
        let ctx = context("Explain how ownership works in Rust");
        assert_eq!(ctx.complexity, Complexity::Complex);
        assert_eq!(ctx.input_tokens, 6);
        assert_eq!(ctx.output_tokens, 18);
        assert!(!ctx.has_pii);
    }

    #[test]
    fn test_free_backend_gets_full_cost_score() {
        let scorer = MultiFactorScorer::default();
        let score = scorer.score(&local(), &context("Write a short poem"));

        assert_eq!(score.cost, 100.0);
        assert_eq!(score.estimated_cost, 0.0);
    }

    #[test]
    fn test_cost_normalization() {
        let scorer = MultiFactorScorer::default();
        // 10 in + 20 out tokens at 0.001 per token = 0.03 -> 70
        let backend = Backend::new("pricey", "cloud").with_costs(0.001, 0.001);
        let prompt = vec!["token"; 10].join(" ");
        let score = scorer.score(&backend, &context(&prompt));

        assert!((score.estimated_cost - 0.03).abs() < EPSILON);
        assert!((score.cost - 70.0).abs() < EPSILON);
    }

    #[test]
    fn test_cost_ceiling_zeroes_only_cost() {
        let scorer = MultiFactorScorer::default();
        let hints = Hints::new().with_max_cost(0.0);
        let ctx = RequestContext::analyze("Write a short poem", &hints);
        let score = scorer.score(&cloud(), &ctx);

        assert!(score.eligible);
        assert_eq!(score.cost, 0.0);
        assert_eq!(score.privacy, 100.0);
        assert!(score.overall > 0.0);
    }

    #[test]
    fn test_pii_excludes_unapproved_backend() {
        let scorer = MultiFactorScorer::default();
        let score = scorer.score(&cloud(), &context("My SSN is 123-45-6789"));

        assert!(!score.eligible);
        assert_eq!(score.overall, 0.0);
        assert_eq!(score.privacy, 0.0);
        assert_eq!(score.cost, 0.0);
        assert_eq!(score.capability, 0.0);
        assert_eq!(score.latency, 0.0);
        assert!(score.reason.starts_with("privacy constraint violated"));
        assert!(score.estimated_cost > 0.0);
    }

    #[test]
    fn test_pii_allowed_for_approved_backend() {
        let scorer = MultiFactorScorer::new(ScoringWeights::DEFAULT, ["openai"]);
        let score = scorer.score(&cloud(), &context("My SSN is 123-45-6789"));

        assert!(score.eligible);
        assert_eq!(score.privacy, 100.0);
    }

    #[test]
    fn test_require_local_excludes_cloud() {
        let scorer = MultiFactorScorer::default();
        let ctx = RequestContext::analyze("Write a short poem", &Hints::new().require_local());

        assert!(!scorer.score(&cloud(), &ctx).eligible);
        assert!(scorer.score(&local(), &ctx).eligible);
    }

    #[test]
    fn test_capability_table() {
        let scorer = MultiFactorScorer::default();
        let edge = Backend::new("edge", "edge");

        let simple = context("What is Rust?");
        assert_eq!(scorer.score(&local(), &simple).capability, 100.0);
        assert_eq!(scorer.score(&cloud(), &simple).capability, 85.0);

        let moderate = context("Write a short poem");
        assert_eq!(scorer.score(&cloud(), &moderate).capability, 90.0);
        assert_eq!(scorer.score(&edge, &moderate).capability, 85.0);

        let complex = context("Explain lifetimes");
        assert_eq!(scorer.score(&cloud(), &complex).capability, 100.0);
        assert_eq!(scorer.score(&local(), &complex).capability, 70.0);
    }

    #[test]
    fn test_capability_scaled_by_backend_capability() {
        let scorer = MultiFactorScorer::default();
        let weaker = cloud().with_capability(0.5);
        let score = scorer.score(&weaker, &context("Explain lifetimes"));
        assert!((score.capability - 50.0).abs() < EPSILON);
    }

    #[test]
    fn test_latency_scores() {
        let scorer = MultiFactorScorer::default();
        let ctx = context("Write a short poem");
        assert!((scorer.score(&local(), &ctx).latency - 90.0).abs() < EPSILON);
        assert!((scorer.score(&cloud(), &ctx).latency - 70.0).abs() < EPSILON);

        let tight = RequestContext::analyze("Write a short poem", &Hints::new().with_max_latency_ms(1000));
        let score = scorer.score(&cloud(), &tight);
        assert!(score.eligible);
        assert_eq!(score.latency, 0.0);
    }

    #[test]
    fn test_overall_is_unnormalized_weighted_sum() {
        let weights = ScoringWeights {
            privacy: 1.0,
            cost: 1.0,
            capability: 1.0,
            latency: 1.0,
        };
        let scorer = MultiFactorScorer::new(weights, Vec::<String>::new());
        let score = scorer.score(&local(), &context("Write a short poem"));

        // 100 + 100 + 85 + 90
        assert!((score.overall - 375.0).abs() < EPSILON);
    }

    #[test]
    fn test_route_picks_highest_score() {
        let scorer = MultiFactorScorer::default();
        let registry: BackendRegistry = [cloud(), local()].into_iter().collect();

        let (name, score) = scorer
            .route(&registry, "What is the capital of France?", &Hints::default())
            .unwrap();
        assert_eq!(name, "ollama");
        assert!(score.eligible);
    }

    #[test]
    fn test_route_ties_go_to_first_registered() {
        let scorer = MultiFactorScorer::default();
        let registry: BackendRegistry = [
            Backend::new("first", "cloud"),
            Backend::new("second", "cloud"),
        ]
        .into_iter()
        .collect();

        let (name, _) = scorer
            .route(&registry, "Write a short poem", &Hints::default())
            .unwrap();
        assert_eq!(name, "first");
    }

    #[test]
    fn test_route_no_eligible_backend() {
        let scorer = MultiFactorScorer::default();
        let registry: BackendRegistry = [cloud()].into_iter().collect();

        let result = scorer.route(&registry, "email me at bob@example.com", &Hints::default());
        assert!(matches!(result, Err(WaypointError::NoEligibleBackend { .. })));
    }

    #[test]
    fn test_route_empty_registry() {
        let scorer = MultiFactorScorer::default();
        let result = scorer.route(&BackendRegistry::new(), "hello", &Hints::default());
        assert!(matches!(result, Err(WaypointError::NoEligibleBackend { .. })));
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoringWeights::DEFAULT.validate().is_ok());
        let negative = ScoringWeights {
            cost: -0.1,
            ..ScoringWeights::DEFAULT
        };
        assert!(negative.validate().is_err());
    }
}
