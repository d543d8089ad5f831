use clap::Args;

use crate::router::Hints;

pub mod dispatch;
pub mod inspect;

pub use dispatch::{handle_dispatch, handle_route};
pub use inspect::{handle_backends, handle_config};

/// Per-request hints accepted by `dispatch` and `route`
#[derive(Args, Debug, Clone, Default)]
pub struct HintArgs {
    /// Upper bound on the estimated cost of the request
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Upper bound on the expected latency in milliseconds
    #[arg(long)]
    pub max_latency_ms: Option<u64>,

    /// Only consider local backends
    #[arg(long)]
    pub require_local: bool,

    /// Sampling temperature forwarded to the backend
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum output tokens forwarded to the backend
    #[arg(long)]
    pub max_tokens: Option<u64>,
}

impl From<HintArgs> for Hints {
    fn from(args: HintArgs) -> Self {
        let mut hints = Hints::new();
        if let Some(max_cost) = args.max_cost {
            hints = hints.with_max_cost(max_cost);
        }
        if let Some(max_latency_ms) = args.max_latency_ms {
            hints = hints.with_max_latency_ms(max_latency_ms);
        }
        if args.require_local {
            hints = hints.require_local();
        }
        if let Some(temperature) = args.temperature {
            hints = hints.with_option("temperature", temperature);
        }
        if let Some(max_tokens) = args.max_tokens {
            hints = hints.with_option("max_tokens", max_tokens);
        }
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_args_into_hints() {
        let hints: Hints = HintArgs {
            max_cost: Some(0.01),
            max_latency_ms: None,
            require_local: true,
            temperature: Some(0.2),
            max_tokens: None,
        }
        .into();

        assert_eq!(hints.max_cost, Some(0.01));
        assert_eq!(hints.max_latency_ms, None);
        assert!(hints.require_local);
        assert_eq!(hints.options["temperature"], 0.2);
        assert!(!hints.options.contains_key("max_tokens"));
    }
}
