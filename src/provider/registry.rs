// src/provider/registry.rs — Fallback chains and request-type model preferences
//
// Pure lookup tables. Built once (from the built-ins, optionally overlaid
// with config) and shared read-only by every gateway call.

use std::collections::{BTreeMap, HashMap};

use super::ModelId;
use crate::infra::errors::GatewayError;

/// Logical request categories used by the application.
pub mod request_types {
    pub const ASK_QUESTION: &str = "ASK_QUESTION";
    pub const DRAFT_COMMUNICATION: &str = "DRAFT_COMMUNICATION";
    pub const JOURNAL_ENTRY: &str = "JOURNAL_ENTRY";
    pub const OPPORTUNITY_EVALUATION: &str = "OPPORTUNITY_EVALUATION";
    pub const ORION_IMPROVEMENT: &str = "ORION_IMPROVEMENT";
    pub const JD_ANALYSIS: &str = "JD_ANALYSIS";
    pub const CV_COMPONENT_TAILORING: &str = "CV_COMPONENT_TAILORING";
    pub const PROFILE_SUMMARY_TAILORING: &str = "PROFILE_SUMMARY_TAILORING";
    pub const CODE_GENERATION: &str = "CODE_GENERATION";
    pub const CODE_EXPLANATION: &str = "CODE_EXPLANATION";
}

/// Table key that selects the global default entry.
pub const DEFAULT_KEY: &str = "default";

const AZURE_GPT: &str = "azure/gpt-4.1";
const AZURE_R1: &str = "azure/DeepSeek-R1";
const GROQ_LLAMA: &str = "groq/llama3-70b-8192";
const GROQ_GEMMA: &str = "groq/gemma2-9b-it";
const OR_DEEPSEEK_CHAT: &str = "openrouter/deepseek/deepseek-chat-v3-0324:free";
const OR_DEEPSEEK_CODER: &str = "openrouter/deepseek/deepseek-coder-v2-0324:free";
const OR_GEMINI_FLASH: &str = "openrouter/google/gemini-2.0-flash-exp:free";
const OR_CLAUDE: &str = "openrouter/anthropic/claude-3-5-sonnet";
const MISTRAL_LARGE: &str = "mistral/mistral-large-latest";
const GEMINI_PRO: &str = "gemini/gemini-1.5-pro-latest";

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    chains: HashMap<ModelId, Vec<ModelId>>,
    default_chain: Vec<ModelId>,
    preferences: HashMap<String, Vec<ModelId>>,
    default_preference: Vec<ModelId>,
}

impl ModelRegistry {
    /// Build from string tables. A `"default"` key in either table sets the
    /// global default for that table. Every id is validated here, so an
    /// unknown provider prefix fails at startup rather than mid-request.
    pub fn from_tables(
        chains: &BTreeMap<String, Vec<String>>,
        preferences: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, GatewayError> {
        let mut registry = Self::default();
        registry.overlay(chains, preferences)?;
        Ok(registry)
    }

    /// The tables the application ships with. Errors only if a literal id
    /// above is malformed.
    pub fn builtin() -> Result<Self, GatewayError> {
        use request_types::*;

        let chain_to = |exclude: &str| -> Vec<&'static str> {
            [
                AZURE_GPT,
                AZURE_R1,
                GROQ_LLAMA,
                OR_DEEPSEEK_CHAT,
                OR_GEMINI_FLASH,
                OR_CLAUDE,
                MISTRAL_LARGE,
                GEMINI_PRO,
            ]
            .into_iter()
            .filter(|m| *m != exclude)
            .collect()
        };

        let chains: Vec<(&str, Vec<&str>)> = vec![
            (AZURE_GPT, chain_to(AZURE_GPT)),
            (AZURE_R1, chain_to(AZURE_R1)),
            (
                DEFAULT_KEY,
                vec![
                    AZURE_GPT,
                    AZURE_R1,
                    OR_DEEPSEEK_CHAT,
                    GROQ_LLAMA,
                    OR_GEMINI_FLASH,
                    MISTRAL_LARGE,
                    OR_CLAUDE,
                    GEMINI_PRO,
                    GROQ_GEMMA,
                ],
            ),
        ];

        let preferences: Vec<(&str, Vec<&str>)> = vec![
            (
                OPPORTUNITY_EVALUATION,
                vec![AZURE_GPT, AZURE_R1, GROQ_LLAMA, OR_DEEPSEEK_CHAT],
            ),
            (DRAFT_COMMUNICATION, vec![AZURE_GPT, GROQ_LLAMA, OR_DEEPSEEK_CHAT]),
            (ASK_QUESTION, vec![OR_DEEPSEEK_CHAT, AZURE_GPT, GROQ_LLAMA]),
            (JOURNAL_ENTRY, vec![OR_DEEPSEEK_CHAT, AZURE_GPT]),
            (ORION_IMPROVEMENT, vec![AZURE_GPT, GROQ_LLAMA]),
            (JD_ANALYSIS, vec![OR_GEMINI_FLASH, AZURE_GPT]),
            (CV_COMPONENT_TAILORING, vec![OR_GEMINI_FLASH, AZURE_GPT]),
            (PROFILE_SUMMARY_TAILORING, vec![OR_GEMINI_FLASH, AZURE_GPT]),
            (CODE_GENERATION, vec![OR_DEEPSEEK_CODER, AZURE_GPT]),
            (CODE_EXPLANATION, vec![OR_DEEPSEEK_CODER, AZURE_GPT]),
            (
                DEFAULT_KEY,
                vec![AZURE_GPT, AZURE_R1, OR_DEEPSEEK_CHAT, GROQ_LLAMA],
            ),
        ];

        let to_table = |rows: Vec<(&str, Vec<&str>)>| -> BTreeMap<String, Vec<String>> {
            rows.into_iter()
                .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
                .collect()
        };

        Self::from_tables(&to_table(chains), &to_table(preferences))
    }

    /// Replace entries key-by-key with those from the given tables.
    pub fn overlay(
        &mut self,
        chains: &BTreeMap<String, Vec<String>>,
        preferences: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), GatewayError> {
        for (key, models) in chains {
            let models = parse_all(models)?;
            if key == DEFAULT_KEY {
                self.default_chain = models;
            } else {
                self.chains.insert(ModelId::parse(key)?, models);
            }
        }
        for (key, models) in preferences {
            let models = parse_all(models)?;
            if key == DEFAULT_KEY {
                self.default_preference = models;
            } else {
                self.preferences.insert(key.clone(), models);
            }
        }
        Ok(())
    }

    /// The fallback chain for `model`, or the global default chain.
    pub fn fallbacks_for(&self, model: &ModelId) -> &[ModelId] {
        self.chains
            .get(model)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_chain)
    }

    /// The preferred model ordering for a request type, or the global default.
    pub fn preferred_models_for(&self, request_type: &str) -> &[ModelId] {
        self.preferences
            .get(request_type)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_preference)
    }

    pub fn request_types(&self) -> impl Iterator<Item = &str> {
        self.preferences.keys().map(String::as_str)
    }

    /// Every model id mentioned anywhere in the tables, deduplicated.
    pub fn known_models(&self) -> Vec<ModelId> {
        let mut all: Vec<ModelId> = self
            .chains
            .iter()
            .flat_map(|(k, v)| std::iter::once(k).chain(v))
            .chain(&self.default_chain)
            .chain(self.preferences.values().flatten())
            .chain(&self.default_preference)
            .cloned()
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

fn parse_all(models: &[String]) -> Result<Vec<ModelId>, GatewayError> {
    models.iter().map(|m| ModelId::parse(m)).collect()
}
