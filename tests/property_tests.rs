use proptest::prelude::*;
use waypoint::router::{
    Backend, BackendRegistry, Classification, ComplexityClassifier, MultiFactorScorer, Policy,
    PolicyRouter, RequestContext, Request,
};
use waypoint::{Hints, Orchestrator, ScoringWeights};

fn weights() -> impl Strategy<Value = ScoringWeights> {
    (0.0..2.0f64, 0.0..2.0f64, 0.0..2.0f64, 0.0..2.0f64).prop_map(
        |(privacy, cost, capability, latency)| ScoringWeights {
            privacy,
            cost,
            capability,
            latency,
        },
    )
}

fn class() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("local"), Just("cloud"), Just("edge")]
}

fn backends() -> impl Strategy<Value = Vec<Backend>> {
    prop::collection::vec(
        (class(), 0.0..0.0001f64, 0.0..0.0001f64, 0.0..=1.0f64),
        1..6,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (class, input, output, capability))| {
                Backend::new(format!("backend-{}", i), class)
                    .with_costs(input, output)
                    .with_capability(capability)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn free_backends_get_full_cost_score(prompt in "[a-z ]{1,80}", weights in weights()) {
        let scorer = MultiFactorScorer::new(weights, Vec::<String>::new());
        let context = RequestContext::analyze(&prompt, &Hints::new());
        let score = scorer.score(&Backend::new("free", "cloud"), &context);
        prop_assert_eq!(score.cost, 100.0);
    }

    #[test]
    fn pii_to_unapproved_backend_zeroes_everything(
        digits in "[0-9]{3}-[0-9]{2}-[0-9]{4}",
        backends in backends(),
    ) {
        let prompt = format!("my ssn is {}", digits);
        let scorer = MultiFactorScorer::new(ScoringWeights::DEFAULT, Vec::<String>::new());
        let context = RequestContext::analyze(&prompt, &Hints::new());
        for backend in &backends {
            let score = scorer.score(backend, &context);
            prop_assert!(!score.eligible);
            prop_assert_eq!(score.overall, 0.0);
            prop_assert_eq!(score.privacy, 0.0);
            prop_assert_eq!(score.cost, 0.0);
            prop_assert_eq!(score.capability, 0.0);
            prop_assert_eq!(score.latency, 0.0);
        }
    }

    #[test]
    fn complexity_is_deterministic(prompt in ".{0,400}") {
        prop_assert_eq!(
            ComplexityClassifier::classify(&prompt),
            ComplexityClassifier::classify(&prompt)
        );
    }

    #[test]
    fn capability_score_is_monotonic(low in 0.0..=1.0f64, high in 0.0..=1.0f64, prompt in "[a-z ]{1,120}") {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let scorer = MultiFactorScorer::default();
        let context = RequestContext::analyze(&prompt, &Hints::new());
        let weaker = scorer.score(&Backend::new("a", "cloud").with_capability(low), &context);
        let stronger = scorer.score(&Backend::new("b", "cloud").with_capability(high), &context);
        prop_assert!(stronger.capability >= weaker.capability);
        prop_assert!(stronger.overall >= weaker.overall);
    }

    #[test]
    fn routing_is_idempotent(prompt in "[a-zA-Z0-9 @.-]{1,120}", backends in backends(), weights in weights()) {
        let registry: BackendRegistry = backends.into_iter().collect();
        let scorer = MultiFactorScorer::new(weights, registry.names());
        let first = scorer.route(&registry, &prompt, &Hints::new()).map(|(name, _)| name).ok();
        let second = scorer.route(&registry, &prompt, &Hints::new()).map(|(name, _)| name).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn winner_has_maximal_score(prompt in "[a-z ]{1,120}", backends in backends(), weights in weights()) {
        let registry: BackendRegistry = backends.into_iter().collect();
        let scorer = MultiFactorScorer::new(weights, Vec::<String>::new());
        let context = RequestContext::analyze(&prompt, &Hints::new());
        let (winner, score) = scorer.route(&registry, &prompt, &Hints::new()).unwrap();

        let all = scorer.score_all(&registry, &context);
        let first_best = all
            .iter()
            .filter(|s| s.eligible)
            .fold(None::<&waypoint::router::FactorScore>, |best, s| match best {
                Some(b) if s.overall <= b.overall => Some(b),
                _ => Some(s),
            })
            .unwrap();
        prop_assert_eq!(&winner, &first_best.backend);
        prop_assert_eq!(score.overall, first_best.overall);
    }

    #[test]
    fn explicit_mapping_beats_smart_default(label in "[A-Z]{3,10}", prompt in "[a-z ]{1,60}") {
        let registry: BackendRegistry = [
            Backend::new("local", "local"),
            Backend::new("cloud", "cloud"),
            Backend::new("pinned", "edge"),
        ]
        .into_iter()
        .collect();

        let mut router = PolicyRouter::new();
        let fixed = label.clone();
        router.add_policy(Policy::strict(move |_: &Request| Classification::new(fixed.clone())));
        router.map_classification(label.as_str(), "pinned");

        prop_assert_eq!(router.route(&registry, &prompt), Some("pinned".to_string()));
    }

    #[test]
    fn dispatch_returns_routed_backend(prompt in "[a-z ]{1,80}") {
        let mut orchestrator = Orchestrator::multi_factor(ScoringWeights::DEFAULT, Vec::<String>::new());
        orchestrator.add_backend(Backend::new("local", "local"), None);
        orchestrator.add_backend(Backend::new("cloud", "cloud").with_costs(0.00001, 0.00003), None);

        let decision = orchestrator.explain(&prompt, &Hints::new()).unwrap();
        let response = tokio_test::block_on(orchestrator.dispatch(&prompt, &Hints::new())).unwrap();
        prop_assert_eq!(response.backend, decision.backend);
        prop_assert!(!response.was_fallback);
    }
}
