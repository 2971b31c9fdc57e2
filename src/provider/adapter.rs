// src/provider/adapter.rs — Provider adapter contract and dispatch

use super::azure::AzureAdapter;
use super::cohere::CohereAdapter;
use super::credentials::ResolvedCredentials;
use super::google::GeminiAdapter;
use super::openai_compat::OpenAICompatAdapter;
use super::transport::{HttpRequestSpec, HttpResponse};
use super::{ChatRequest, Completion, ErrorInfo, Provider};

/// Translation between the normalized request/response and one provider's
/// wire format. Adapters are stateless; all I/O happens in the transport.
pub trait ProviderAdapter: Send + Sync {
    fn build_request(
        &self,
        request: &ChatRequest,
        credentials: &ResolvedCredentials,
    ) -> Result<HttpRequestSpec, ErrorInfo>;

    /// Parse a 2xx response body. Anything unusable is `InvalidResponse`.
    fn parse_response(&self, response: &HttpResponse) -> Result<Completion, ErrorInfo>;
}

static AZURE: AzureAdapter = AzureAdapter;
static GEMINI: GeminiAdapter = GeminiAdapter;
static COHERE: CohereAdapter = CohereAdapter;
static GROQ: OpenAICompatAdapter = OpenAICompatAdapter::new("https://api.groq.com/openai/v1");
static OPENROUTER: OpenAICompatAdapter = OpenAICompatAdapter::new("https://openrouter.ai/api/v1");
static MISTRAL: OpenAICompatAdapter = OpenAICompatAdapter::new("https://api.mistral.ai/v1");
static TOGETHER: OpenAICompatAdapter = OpenAICompatAdapter::new("https://api.together.xyz/v1");

pub fn adapter_for(provider: Provider) -> &'static dyn ProviderAdapter {
    match provider {
        Provider::Azure => &AZURE,
        Provider::Groq => &GROQ,
        Provider::OpenRouter => &OPENROUTER,
        Provider::Gemini => &GEMINI,
        Provider::Mistral => &MISTRAL,
        Provider::Cohere => &COHERE,
        Provider::TogetherAi => &TOGETHER,
    }
}

/// Parse a response body as JSON, mapping failure to `InvalidResponse`.
pub(crate) fn parse_json(response: &HttpResponse) -> Result<serde_json::Value, ErrorInfo> {
    serde_json::from_str(&response.body)
        .map_err(|e| ErrorInfo::invalid_response(format!("Failed to parse response: {e}")))
}

/// Tool specs must carry a name and an object schema.
pub(crate) fn validate_tools(request: &ChatRequest) -> Result<(), ErrorInfo> {
    for tool in &request.tools {
        if tool.name.trim().is_empty() {
            return Err(ErrorInfo::invalid_request("tool spec has an empty name"));
        }
        if !tool.parameters.is_object() {
            return Err(ErrorInfo::invalid_request(format!(
                "tool '{}' parameters must be a JSON object",
                tool.name
            )));
        }
    }
    Ok(())
}
