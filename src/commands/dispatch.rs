use tracing::{error, info};

use crate::commands::HintArgs;
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::router::{Hints, PiiScanner};

/// Dispatch a prompt and print the response as JSON
pub async fn handle_dispatch(config: &Config, prompt: &str, hint_args: HintArgs) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let hints: Hints = hint_args.into();

    info!(
        has_pii = PiiScanner::has_pii(prompt),
        "Dispatching prompt ({} mode)",
        orchestrator.mode()
    );

    match orchestrator.dispatch(prompt, &hints).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            error!("Dispatch failed: {}", e);
            Err(e)
        }
    }
}

/// Print the routing decision without invoking any backend
pub fn handle_route(config: &Config, prompt: &str, hint_args: HintArgs) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let decision = orchestrator.explain(prompt, &hint_args.into())?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
