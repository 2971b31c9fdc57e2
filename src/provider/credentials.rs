// src/provider/credentials.rs — Model catalog and credential resolution
//
// Secrets only ever come from the environment. The catalog records which
// variables to read for each model; the resolver reads them on demand and
// caches successful lookups for the life of the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::{ErrorInfo, ModelId, Provider};
use crate::infra::errors::GatewayError;

/// Where a model's credentials and routing metadata come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra static headers sent with every request to this model.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ModelConfig {
    pub fn with_key_env(api_key_env: impl Into<String>) -> Self {
        Self {
            api_key_env: api_key_env.into(),
            ..Default::default()
        }
    }

    /// Defaults for a model the catalog doesn't list explicitly.
    pub fn default_for(model: &ModelId) -> Self {
        let provider = model.provider();
        let mut config = Self::with_key_env(provider.default_api_key_env());
        match provider {
            Provider::Azure => {
                config.endpoint_env = Some("AZURE_OPENAI_ENDPOINT".into());
                config.deployment_id = Some(model.name().to_string());
                config.api_version = Some(DEFAULT_AZURE_API_VERSION.into());
            }
            Provider::OpenRouter => {
                config.headers = openrouter_headers();
            }
            _ => {}
        }
        config
    }
}

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";

fn openrouter_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("HTTP-Referer".to_string(), "http://localhost:3000".to_string()),
        ("X-Title".to_string(), "Orion".to_string()),
    ])
}

/// Per-model configuration table. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: BTreeMap<ModelId, ModelConfig>,
}

impl ModelCatalog {
    pub fn new(entries: BTreeMap<ModelId, ModelConfig>) -> Self {
        Self { entries }
    }

    /// The models the application ships with. Errors only if a literal id
    /// below is malformed.
    pub fn builtin() -> Result<Self, GatewayError> {
        let mut rows: Vec<(&str, ModelConfig)> = Vec::new();
        let mut add = |id: &'static str, config: ModelConfig| rows.push((id, config));

        add(
            "azure/gpt-4.1",
            ModelConfig {
                api_key_env: "AZURE_OPENAI_API_KEY".into(),
                endpoint_env: Some("AZURE_OPENAI_ENDPOINT".into()),
                deployment_id: Some("gpt-4.1".into()),
                api_version: Some("2025-01-01-preview".into()),
                ..Default::default()
            },
        );
        add(
            "azure/DeepSeek-R1",
            ModelConfig {
                api_key_env: "AZURE_DEEPSEEK_API_KEY".into(),
                endpoint_env: Some("AZURE_DEEPSEEK_ENDPOINT".into()),
                deployment_id: Some("DeepSeek-R1".into()),
                api_version: Some("2024-05-01-preview".into()),
                ..Default::default()
            },
        );

        for id in [
            "groq/llama3-70b-8192",
            "groq/gemma2-9b-it",
            "groq/llama-3.1-70b-versatile",
            "groq/mistral-hermes-24b",
            "groq/deepseek-r1-distill-qwen-32b",
        ] {
            add(id, ModelConfig::with_key_env("GROQ_API_KEY"));
        }

        for id in [
            "openrouter/mistralai/mistral-7b-instruct",
            "openrouter/google/gemini-2.0-flash-exp:free",
            "openrouter/deepseek/deepseek-chat-v3-0324:free",
            "openrouter/deepseek/deepseek-coder-v2-0324:free",
            "openrouter/anthropic/claude-3-5-sonnet",
        ] {
            add(
                id,
                ModelConfig {
                    api_key_env: "OPEN_ROUTER_API_KEY".into(),
                    api_base: Some("https://openrouter.ai/api/v1".into()),
                    headers: openrouter_headers(),
                    ..Default::default()
                },
            );
        }

        for id in ["mistral/mistral-large-latest", "mistral/mistral-small-latest"] {
            add(id, ModelConfig::with_key_env("MISTRAL_API_KEY"));
        }
        for id in ["gemini/gemini-1.5-pro-latest", "gemini/gemini-1.5-flash-latest"] {
            add(id, ModelConfig::with_key_env("GEMINI_API_KEY"));
        }
        add("cohere/command-r-plus", ModelConfig::with_key_env("COHERE_API_KEY"));
        for id in [
            "together_ai/meta-llama/Llama-3.1-70B-Instruct-hf",
            "together_ai/Qwen/Qwen2-72B-Instruct",
        ] {
            add(id, ModelConfig::with_key_env("TOGETHER_API_KEY"));
        }

        let entries = rows
            .into_iter()
            .map(|(id, config)| ModelId::parse(id).map(|model| (model, config)))
            .collect::<Result<BTreeMap<_, _>, GatewayError>>()?;
        Ok(Self { entries })
    }

    /// Layer `overrides` on top of this catalog, entry by entry.
    pub fn merged(mut self, overrides: &BTreeMap<String, ModelConfig>) -> Result<Self, GatewayError> {
        for (id, config) in overrides {
            if config.api_key_env.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "model '{id}' has an empty api_key_env"
                )));
            }
            self.entries.insert(ModelId::parse(id)?, config.clone());
        }
        Ok(self)
    }

    /// Explicit entry, or the provider defaults.
    pub fn config_for(&self, model: &ModelId) -> ModelConfig {
        self.entries
            .get(model)
            .cloned()
            .unwrap_or_else(|| ModelConfig::default_for(model))
    }

    pub fn get(&self, model: &ModelId) -> Option<&ModelConfig> {
        self.entries.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModelId, &ModelConfig)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read access to environment variables. Swappable so tests never touch
/// the real process environment.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Everything an adapter needs to address and authenticate one model.
#[derive(Clone, PartialEq)]
pub struct ResolvedCredentials {
    pub api_key: String,
    pub endpoint: Option<String>,
    pub deployment_id: Option<String>,
    pub api_version: Option<String>,
    pub api_base: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl ResolvedCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            deployment_id: None,
            api_version: None,
            api_base: None,
            headers: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("deployment_id", &self.deployment_id)
            .field("api_version", &self.api_version)
            .field("api_base", &self.api_base)
            .finish()
    }
}

pub struct CredentialResolver {
    catalog: Arc<ModelCatalog>,
    env: Arc<dyn EnvSource>,
    cache: RwLock<HashMap<ModelId, ResolvedCredentials>>,
}

impl CredentialResolver {
    pub fn new(catalog: Arc<ModelCatalog>, env: Arc<dyn EnvSource>) -> Self {
        Self {
            catalog,
            env,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Resolve credentials for `model`, or `NotConfigured` if any referenced
    /// variable is unset or empty.
    pub fn resolve(&self, model: &ModelId) -> Result<ResolvedCredentials, ErrorInfo> {
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(model) {
                return Ok(hit.clone());
            }
        }

        let config = self.catalog.config_for(model);
        let api_key = self.non_empty(&config.api_key_env).ok_or_else(|| {
            ErrorInfo::not_configured(format!(
                "{} is not set for {model}",
                config.api_key_env
            ))
            .with_provider(model.provider().prefix())
        })?;

        let endpoint = match &config.endpoint_env {
            Some(var) => Some(self.non_empty(var).ok_or_else(|| {
                ErrorInfo::not_configured(format!("{var} is not set for {model}"))
                    .with_provider(model.provider().prefix())
            })?),
            None => None,
        };

        let resolved = ResolvedCredentials {
            api_key,
            endpoint,
            deployment_id: config.deployment_id,
            api_version: config.api_version,
            api_base: config.api_base,
            headers: config.headers,
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(model.clone(), resolved.clone());
        }
        Ok(resolved)
    }

    /// Whether the model's API key variable is present, without caching.
    pub fn has_api_key(&self, model: &ModelId) -> bool {
        let config = self.catalog.config_for(model);
        self.non_empty(&config.api_key_env).is_some()
    }

    fn non_empty(&self, var: &str) -> Option<String> {
        self.env
            .var(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
