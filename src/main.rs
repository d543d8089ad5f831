use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use waypoint::commands::{self, HintArgs};
use waypoint::config::LoggingConfig;
use waypoint::{Config, Result};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Privacy-aware request dispatch across local and cloud backends")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "WAYPOINT_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a prompt and send it to the selected backend
    Dispatch {
        prompt: String,

        #[command(flatten)]
        hints: HintArgs,
    },

    /// Show which backend a prompt would go to, without sending it
    Route {
        prompt: String,

        #[command(flatten)]
        hints: HintArgs,
    },

    /// List configured backends
    Backends,

    /// Validate configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();

    let _guard = init_tracing(cli.verbose, &logging)?;

    let config = loaded.inspect_err(|e| error!("Configuration validation failed: {}", e))?;

    match cli.command {
        Commands::Dispatch { prompt, hints } => commands::handle_dispatch(&config, &prompt, hints).await,
        Commands::Route { prompt, hints } => commands::handle_route(&config, &prompt, hints),
        Commands::Backends => commands::handle_backends(&config),
        Commands::Config => commands::handle_config(&config),
    }
}

fn init_tracing(verbose: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter);

    if !logging.file_enabled {
        registry.init();
        return Ok(None);
    }

    let log_dir = logging.log_dir()?;

    let rotation = match logging.rotation.as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        "never" => Rotation::NEVER,
        _ => {
            eprintln!("Warning: Invalid log rotation '{}', using daily", logging.rotation);
            Rotation::DAILY
        }
    };

    let file_appender = RollingFileAppender::new(rotation, &log_dir, &logging.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    registry
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
