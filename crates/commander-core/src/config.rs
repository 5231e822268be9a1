use crate::error::{CommanderError, Result};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Simulator backends the built-in state source knows how to drive.
pub const KNOWN_BACKENDS: &[&str] = &["bell_state_simulator", "aer_simulator", "qasm_simulator"];

/// Entanglement models the built-in state source can prepare.
pub const KNOWN_ENTANGLEMENT_MODELS: &[&str] = &["bell", "psi"];

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// When `true`, the process defaults to a bounded simulation instead of
    /// the continuous loop.
    #[serde(default)]
    pub simulation_mode: bool,
    pub tick_rate_hz: f64,
    #[serde(default = "default_simulation_steps")]
    pub simulation_steps: u32,
}

fn default_simulation_steps() -> u32 {
    100
}

impl OrchestratorConfig {
    pub fn new(tick_rate_hz: f64) -> Self {
        Self {
            simulation_mode: false,
            tick_rate_hz,
            simulation_steps: default_simulation_steps(),
        }
    }

    /// `1 / tick_rate_hz`, rejecting rates that do not yield a usable period.
    pub fn tick_period(&self) -> Result<Duration> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(CommanderError::InvalidConfig(format!(
                "orchestrator.tick_rate_hz must be a positive number, got {}",
                self.tick_rate_hz
            )));
        }
        Duration::try_from_secs_f64(1.0 / self.tick_rate_hz).map_err(|e| {
            CommanderError::InvalidConfig(format!(
                "orchestrator.tick_rate_hz {} yields no usable period: {e}",
                self.tick_rate_hz
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// StateSourceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSourceConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_shots")]
    pub shots: u32,
    #[serde(default = "default_entanglement_model")]
    pub entanglement_model: String,
    /// Fixed RNG seed for reproducible measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_backend() -> String {
    "bell_state_simulator".to_string()
}

fn default_shots() -> u32 {
    1024
}

fn default_entanglement_model() -> String {
    "bell".to_string()
}

impl Default for StateSourceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            shots: default_shots(),
            entanglement_model: default_entanglement_model(),
            seed: None,
            retry: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Environment variable holding the access token. Unset means offline.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Backing store used once connected.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    7687
}

fn default_token_env() -> String {
    "CHRONOSDB_TOKEN".to_string()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("commander-ledger.redb")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token_env: default_token_env(),
            path: default_ledger_path(),
            retry: None,
        }
    }
}

impl LedgerConfig {
    /// The token from `token_env`, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// DecisionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_model_name() -> String {
    "rule-advisor".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    #[serde(default, alias = "qpu_settings")]
    pub state_source: StateSourceConfig,
    #[serde(default, alias = "chronosdb_config")]
    pub ledger: LedgerConfig,
    #[serde(default, alias = "genai_agent")]
    pub decision: DecisionConfig,
}

impl Config {
    pub fn new(tick_rate_hz: f64) -> Self {
        Self {
            orchestrator: OrchestratorConfig::new(tick_rate_hz),
            state_source: StateSourceConfig::default(),
            ledger: LedgerConfig::default(),
            decision: DecisionConfig::default(),
        }
    }

    /// Read, parse and validate the YAML config at `path`.
    ///
    /// Error-level findings abort; warnings are logged and tolerated.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CommanderError::ConfigNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), "loading configuration");
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate_strict()?;
        Ok(config)
    }

    /// Fails on the first batch of error-level findings.
    pub fn validate_strict(&self) -> Result<()> {
        let mut errors = Vec::new();
        for finding in self.validate() {
            match finding.level {
                WarnLevel::Error => errors.push(finding.message),
                WarnLevel::Warning => tracing::warn!("{}", finding.message),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CommanderError::InvalidConfig(errors.join("; ")))
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = self.orchestrator.tick_period() {
            warnings.push(ConfigWarning::error(match e {
                CommanderError::InvalidConfig(msg) => msg,
                other => other.to_string(),
            }));
        }
        if self.orchestrator.simulation_steps == 0 {
            warnings.push(ConfigWarning::error(
                "orchestrator.simulation_steps must be greater than 0",
            ));
        }

        if self.state_source.shots == 0 {
            warnings.push(ConfigWarning::error(
                "state_source.shots must be greater than 0",
            ));
        }
        if !KNOWN_ENTANGLEMENT_MODELS.contains(&self.state_source.entanglement_model.as_str()) {
            warnings.push(ConfigWarning::error(format!(
                "state_source.entanglement_model '{}' is not one of: {}",
                self.state_source.entanglement_model,
                KNOWN_ENTANGLEMENT_MODELS.join(", ")
            )));
        }
        if !KNOWN_BACKENDS.contains(&self.state_source.backend.as_str()) {
            warnings.push(ConfigWarning::warning(format!(
                "state_source.backend '{}' is not a known simulator; health checks will fail",
                self.state_source.backend
            )));
        }

        if self.ledger.token_env.trim().is_empty() {
            warnings.push(ConfigWarning::error("ledger.token_env must not be empty"));
        } else if self.ledger.token().is_none() {
            warnings.push(ConfigWarning::warning(format!(
                "env var {} not set; ledger will run in offline mode",
                self.ledger.token_env
            )));
        }

        if !(0.0..=2.0).contains(&self.decision.temperature) {
            warnings.push(ConfigWarning::error(format!(
                "decision.temperature must be within 0.0..=2.0, got {}",
                self.decision.temperature
            )));
        }

        for (section, retry) in [
            ("state_source", &self.state_source.retry),
            ("ledger", &self.ledger.retry),
            ("decision", &self.decision.retry),
        ] {
            if let Some(retry) = retry {
                if !(0.0..=1.0).contains(&retry.jitter_factor) {
                    warnings.push(ConfigWarning::error(format!(
                        "{section}.retry.jitter_factor must be within 0.0..=1.0"
                    )));
                }
                if retry.base_delay_ms > retry.max_delay_ms {
                    warnings.push(ConfigWarning::warning(format!(
                        "{section}.retry.base_delay_ms exceeds max_delay_ms; every delay is clamped"
                    )));
                }
            }
        }

        warnings
    }
}
