// src/infra/config.rs — Configuration loading (TOML)
//
// Secrets never live here; the file only overrides non-secret tables. Every
// section is optional and falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::GatewayError;
use crate::infra::paths;
use crate::provider::credentials::{ModelCatalog, ModelConfig};
use crate::provider::registry::ModelRegistry;
use crate::provider::retry::RetryConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Per-model credential variables and routing, keyed by model id.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,

    /// Fallback chains keyed by model id; `default` is the global chain.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,

    /// Preferred models keyed by request type; `default` is the global list.
    #[serde(default)]
    pub preferences: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter_fraction: defaults.jitter_fraction,
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_fraction: self.jitter_fraction.clamp(0.0, 1.0),
            ..RetryConfig::default()
        }
    }
}

/// Upper bound for any configured timeout (one day).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Both values must lie in `1..=86400`; `Config::parse` rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wall-clock budget for one whole generate call.
    pub budget_secs: u64,
    /// Per HTTP call.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            budget_secs: 30,
            request_secs: 60,
        }
    }
}

impl TimeoutConfig {
    /// Values built in code skip `validate`, so these still clamp.
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs.clamp(1, MAX_TIMEOUT_SECS))
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs.clamp(1, MAX_TIMEOUT_SECS))
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        for (name, value) in [
            ("budget_secs", self.budget_secs),
            ("request_secs", self.request_secs),
        ] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
                return Err(GatewayError::Config(format!(
                    "timeouts.{name} must be between 1 and {MAX_TIMEOUT_SECS}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load from the default location; a missing file means built-in defaults.
    pub fn load() -> Result<Self, GatewayError> {
        let path = paths::config_file();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, GatewayError> {
        let config: Self = toml::from_str(content)?;
        config.timeouts.validate()?;
        // Surface bad model ids now rather than on the first request.
        config.catalog()?;
        config.registry()?;
        Ok(config)
    }

    /// Built-in catalog with `[models]` layered on top.
    pub fn catalog(&self) -> Result<ModelCatalog, GatewayError> {
        ModelCatalog::builtin()?.merged(&self.models)
    }

    /// Built-in chains and preferences with `[fallbacks]` and `[preferences]`
    /// layered on top.
    pub fn registry(&self) -> Result<ModelRegistry, GatewayError> {
        let mut registry = ModelRegistry::builtin()?;
        registry.overlay(&self.fallbacks, &self.preferences)?;
        Ok(registry)
    }
}
