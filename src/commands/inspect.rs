use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Orchestrator;

/// List registered backends in registration order
pub fn handle_backends(config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let backends = orchestrator.backends();

    if backends.is_empty() {
        println!("No backends configured");
        return Ok(());
    }

    println!(
        "{:<20} {:<8} {:>10} {:>14}  {}",
        "NAME", "CLASS", "CAPABILITY", "NOMINAL COST", "MODEL"
    );
    for backend in backends.iter() {
        println!(
            "{:<20} {:<8} {:>10.2} {:>14.6}  {}",
            backend.name,
            backend.class.to_string(),
            backend.capability,
            backend.nominal_cost(),
            backend.model().unwrap_or("-")
        );
    }
    Ok(())
}

/// Validate the configuration and print a summary
pub fn handle_config(config: &Config) -> Result<()> {
    config.validate()?;

    println!("✓ Configuration is valid");
    println!("  Routing mode: {}", config.routing.mode);
    println!("  Backends: {}", config.backends.len());
    println!("  Policies: {}", config.policies.len());
    if !config.routing.classifications.is_empty() {
        println!("  Classification mappings:");
        for (classification, backend) in &config.routing.classifications {
            println!("    {} -> {}", classification, backend);
        }
    }
    if let Some(fallback) = &config.fallback {
        let on = if fallback.on.is_empty() {
            "any failure".to_string()
        } else {
            fallback
                .on
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  Fallback: {} -> {} (on {})", fallback.primary, fallback.fallback, on);
    }

    if let Ok(config_dir) = Config::config_dir() {
        println!("  Config directory: {}", config_dir.display());
    }

    Ok(())
}
