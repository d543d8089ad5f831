use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::adapters::FailureKind;
use crate::error::{Result, WaypointError};
use crate::orchestrator::RoutingMode;
use crate::router::{Backend, BackendClass, Enforcement, ScoringWeights};

const CONFIG_FILE_NAME: &str = "waypoint.toml";
const ENV_PREFIX: &str = "WAYPOINT_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file_enabled")]
    pub file_enabled: bool,
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: default_log_file_enabled(),
            rotation: default_log_rotation(),
            dir: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

impl LoggingConfig {
    /// Configured log directory, or `<data dir>/logs`; created if missing
    pub fn log_dir(&self) -> Result<PathBuf> {
        let log_dir = match &self.dir {
            Some(dir) => PathBuf::from(dir),
            None => get_data_dir()?.join("logs"),
        };
        std::fs::create_dir_all(&log_dir)?;
        Ok(log_dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,
    /// Multi-factor weights; ignored in policy mode
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Backends allowed to receive PII in multi-factor mode
    #[serde(default)]
    pub pii_approved: Vec<String>,
    /// Classification label -> backend name
    #[serde(default)]
    pub classifications: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Mock,
    Ollama,
    Openai,
    Anthropic,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub class: BackendClass,
    #[serde(default)]
    pub cost_per_input_token: f64,
    #[serde(default)]
    pub cost_per_output_token: f64,
    #[serde(default = "default_capability")]
    pub capability: f64,
    #[serde(default)]
    pub adapter: AdapterKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl BackendConfig {
    pub fn to_backend(&self) -> Backend {
        Backend {
            name: self.name.clone(),
            class: self.class.clone(),
            cost_per_input_token: self.cost_per_input_token,
            cost_per_output_token: self.cost_per_output_token,
            capability: self.capability,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// RESTRICTED when the prompt has PII, PUBLIC otherwise
    Privacy,
    /// `classification` when any keyword appears, `default` when none does
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub kind: PolicyKind,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub classification: Option<String>,
    /// Classification when no keyword matches; PUBLIC if unset
    #[serde(default, rename = "default")]
    pub otherwise: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub primary: String,
    pub fallback: String,
    /// Failure kinds that trigger the fallback; empty means any failure
    #[serde(default)]
    pub on: Vec<FailureKind>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_enabled() -> bool {
    true
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_file_prefix() -> String {
    "waypoint".to_string()
}

fn default_capability() -> f64 {
    1.0
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f32 {
    2.0
}

impl Config {
    /// Load `waypoint.toml` from the config directory, overlaid with `WAYPOINT_*` env vars
    pub fn load() -> Result<Self> {
        let config_file = get_config_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from(&config_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = Figment::new().merge(Toml::string(toml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_dir() -> Result<PathBuf> {
        get_config_dir()
    }

    pub fn data_dir() -> Result<PathBuf> {
        get_data_dir()
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        self.logging.log_dir()
    }

    /// Backend configs in registration order, later duplicates replacing earlier ones
    pub fn backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter()
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = FxHashSet::default();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                warn!(
                    "Backend '{}' is defined more than once, the last definition wins",
                    backend.name
                );
            }
            if !(0.0..=1.0).contains(&backend.capability) {
                return Err(WaypointError::configuration(format!(
                    "capability for backend '{}' must be within [0, 1], got {}",
                    backend.name, backend.capability
                )));
            }
            let costs = [backend.cost_per_input_token, backend.cost_per_output_token];
            if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
                return Err(WaypointError::configuration(format!(
                    "token costs for backend '{}' must be non-negative",
                    backend.name
                )));
            }
        }

        self.routing.weights.validate()?;

        let known = |name: &str, context: &str| -> Result<()> {
            if names.contains(name) {
                Ok(())
            } else {
                Err(WaypointError::configuration(format!(
                    "{} refers to unknown backend '{}'",
                    context, name
                )))
            }
        };

        for name in &self.routing.pii_approved {
            known(name, "routing.pii_approved")?;
        }
        for (classification, name) in &self.routing.classifications {
            known(name, &format!("classification mapping '{}'", classification))?;
        }
        if let Some(fallback) = &self.fallback {
            known(&fallback.primary, "fallback.primary")?;
            known(&fallback.fallback, "fallback.fallback")?;
        }

        for policy in &self.policies {
            if policy.kind == PolicyKind::Keyword
                && (policy.keywords.is_empty() || policy.classification.is_none())
            {
                return Err(WaypointError::configuration(
                    "keyword policies need both 'keywords' and 'classification'",
                ));
            }
        }

        if self.routing.mode == RoutingMode::MultiFactor && !self.policies.is_empty() {
            warn!(
                "{} policies configured but routing mode is multi_factor; they will be ignored",
                self.policies.len()
            );
        }

        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "waypoint")
        .ok_or_else(|| WaypointError::Other("Could not determine home directory".to_string()))
}

fn get_config_dir() -> Result<PathBuf> {
    let project_dirs = project_dirs()?;
    let config_dir = project_dirs.config_dir();
    std::fs::create_dir_all(config_dir)?;
    Ok(config_dir.to_path_buf())
}

fn get_data_dir() -> Result<PathBuf> {
    let project_dirs = project_dirs()?;
    let data_dir = project_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.to_path_buf())
}
