//! Backend selection: the registry, the request analyzers and both routing modes.

pub mod backend;
pub mod classifiers;
pub mod complexity;
pub mod pii;
pub mod policy;
pub mod scorer;

pub use backend::{Backend, BackendClass, BackendRegistry};
pub use classifiers::{KeywordClassifier, PrivacyClassifier};
pub use complexity::{Complexity, ComplexityClassifier};
pub use pii::{PiiKind, PiiScanner};
pub use policy::{Classification, Classifier, Enforcement, Policy, PolicyDecision, PolicyRouter, Request};
pub use scorer::{FactorScore, Hints, MultiFactorScorer, RequestContext, ScoringWeights};
