pub mod adapters;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod router;

pub use adapters::{Adapter, AdapterError, FailureKind};
pub use config::Config;
pub use error::{Result, WaypointError};
pub use orchestrator::{FallbackSpec, FallbackTrigger, Orchestrator, Response, RoutingDecision, RoutingMode};
pub use router::{Backend, BackendClass, Hints, ScoringWeights};
