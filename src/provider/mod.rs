// src/provider/mod.rs — Model provider layer

pub mod adapter;
pub mod azure;
pub mod cohere;
pub mod credentials;
pub mod error;
pub mod fallback;
pub mod google;
pub mod health;
pub mod openai_compat;
pub mod registry;
pub mod retry;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use error::{ErrorInfo, ErrorKind};

use crate::infra::errors::GatewayError;

/// Every provider the gateway can talk to. Adding one means adding a variant
/// here and an adapter in `adapter::adapter_for`; the compiler finds the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    Azure,
    Groq,
    OpenRouter,
    Gemini,
    Mistral,
    Cohere,
    TogetherAi,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::Azure,
        Provider::Groq,
        Provider::OpenRouter,
        Provider::Gemini,
        Provider::Mistral,
        Provider::Cohere,
        Provider::TogetherAi,
    ];

    /// The prefix used in model ids (`groq/llama3-70b-8192`).
    pub fn prefix(self) -> &'static str {
        match self {
            Provider::Azure => "azure",
            Provider::Groq => "groq",
            Provider::OpenRouter => "openrouter",
            Provider::Gemini => "gemini",
            Provider::Mistral => "mistral",
            Provider::Cohere => "cohere",
            Provider::TogetherAi => "together_ai",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.prefix() == prefix)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Azure => "Azure OpenAI",
            Provider::Groq => "Groq",
            Provider::OpenRouter => "OpenRouter",
            Provider::Gemini => "Google Gemini",
            Provider::Mistral => "Mistral",
            Provider::Cohere => "Cohere",
            Provider::TogetherAi => "Together AI",
        }
    }

    /// API key variable used for models without an explicit catalog entry.
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Provider::Azure => "AZURE_OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenRouter => "OPEN_ROUTER_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Mistral => "MISTRAL_API_KEY",
            Provider::Cohere => "COHERE_API_KEY",
            Provider::TogetherAi => "TOGETHER_API_KEY",
        }
    }

    /// Closest known prefix, for "did you mean" hints on typos.
    fn suggest(prefix: &str) -> Option<&'static str> {
        Self::ALL
            .into_iter()
            .map(|p| (p.prefix(), strsim::jaro_winkler(p.prefix(), prefix)))
            .filter(|(_, score)| *score > 0.8)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(p, _)| p)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A `provider/model-name` identifier whose provider prefix is known.
///
/// Everything after the first `/` is the provider-side model name, which may
/// itself contain slashes (`openrouter/deepseek/deepseek-chat-v3-0324:free`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId {
    raw: String,
    provider: Provider,
}

impl ModelId {
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        let s = s.trim();
        let (prefix, name) = s
            .split_once('/')
            .ok_or_else(|| GatewayError::InvalidModelId(s.to_string()))?;
        if name.is_empty() {
            return Err(GatewayError::InvalidModelId(s.to_string()));
        }
        let provider = Provider::from_prefix(prefix).ok_or_else(|| GatewayError::UnknownProvider {
            model: s.to_string(),
            provider: prefix.to_string(),
            suggestion: Provider::suggest(prefix).map(str::to_string),
        })?;
        Ok(Self {
            raw: s.to_string(),
            provider,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The model name as the provider knows it.
    pub fn name(&self) -> &str {
        &self.raw[self.provider.prefix().len() + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ModelId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelId {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.raw
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A function the model may call. `parameters` is a JSON Schema object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A normalized request for one concrete model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: ModelId,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Empty means "no tools"; adapters omit the field entirely.
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

/// What an adapter extracts from a successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateFailure {
    pub model: ModelId,
    pub error: ErrorInfo,
}

/// Terminal artifact of one gateway call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_provider_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<ModelId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Per-candidate failures in attempt order, for operator diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CandidateFailure>,
}

impl ChatResult {
    pub fn succeeded(model: ModelId, completion: Completion, failures: Vec<CandidateFailure>) -> Self {
        Self {
            success: true,
            content: Some(completion.content),
            tool_calls: completion.tool_calls,
            usage: completion.usage,
            raw_provider_response: Some(completion.raw),
            model_used: Some(model),
            error: None,
            failures,
        }
    }

    pub fn failed(error: ErrorInfo, failures: Vec<CandidateFailure>) -> Self {
        Self {
            success: false,
            content: None,
            tool_calls: Vec::new(),
            usage: None,
            raw_provider_response: None,
            model_used: None,
            error: Some(error),
            failures,
        }
    }
}
