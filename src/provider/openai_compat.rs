// src/provider/openai_compat.rs — Generic OpenAI-compatible adapter
//
// Used by: Groq, OpenRouter, Mistral, Together AI. Azure speaks the same body
// format and reuses the helpers here.

use serde_json::json;

use super::adapter::{parse_json, validate_tools, ProviderAdapter};
use super::credentials::ResolvedCredentials;
use super::transport::{HttpRequestSpec, HttpResponse};
use super::{ChatRequest, Completion, ErrorInfo, TokenUsage, ToolCall, ToolChoice};

pub struct OpenAICompatAdapter {
    default_base_url: &'static str,
}

impl OpenAICompatAdapter {
    pub const fn new(default_base_url: &'static str) -> Self {
        Self { default_base_url }
    }
}

impl ProviderAdapter for OpenAICompatAdapter {
    fn build_request(
        &self,
        request: &ChatRequest,
        credentials: &ResolvedCredentials,
    ) -> Result<HttpRequestSpec, ErrorInfo> {
        let mut body = chat_body(request)?;
        body["model"] = json!(request.model.name());

        let base = credentials
            .api_base
            .as_deref()
            .unwrap_or(self.default_base_url)
            .trim_end_matches('/');

        let mut spec = HttpRequestSpec::post(format!("{base}/chat/completions"), body)
            .bearer(&credentials.api_key);
        for (name, value) in &credentials.headers {
            spec = spec.header(name.clone(), value.clone());
        }
        Ok(spec)
    }

    fn parse_response(&self, response: &HttpResponse) -> Result<Completion, ErrorInfo> {
        parse_chat_completion(parse_json(response)?)
    }
}

/// The chat-completions body without `model`. Optional fields are omitted,
/// never sent as null.
pub(crate) fn chat_body(request: &ChatRequest) -> Result<serde_json::Value, ErrorInfo> {
    validate_tools(request)?;

    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": m.role.as_str(),
                "content": m.content,
            });
            if let Some(id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(id);
            }
            msg
        })
        .collect();

    let mut body = json!({
        "messages": messages,
        "temperature": request.temperature,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if !request.tools.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }
    if let Some(choice) = &request.tool_choice {
        body["tool_choice"] = match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Function(name) => json!({
                "type": "function",
                "function": { "name": name },
            }),
        };
    }
    Ok(body)
}

/// Extract `choices[0].message` from a chat-completions response.
pub(crate) fn parse_chat_completion(resp: serde_json::Value) -> Result<Completion, ErrorInfo> {
    let message = resp
        .pointer("/choices/0/message")
        .ok_or_else(|| ErrorInfo::invalid_response("Response has no choices[0].message"))?;

    let content = message["content"].as_str().unwrap_or("").to_string();

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let name = c["function"]["name"].as_str()?.to_string();
                    // Arguments arrive as a JSON-encoded string.
                    let arguments = match &c["function"]["arguments"] {
                        serde_json::Value::String(s) => serde_json::from_str(s)
                            .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
                        other => other.clone(),
                    };
                    Some(ToolCall {
                        id: c["id"].as_str().unwrap_or(&name).to_string(),
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if content.trim().is_empty() && tool_calls.is_empty() {
        return Err(ErrorInfo::invalid_response(
            "Response has neither content nor tool calls",
        ));
    }

    let usage = resp["usage"].is_object().then(|| TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(Completion {
        content,
        tool_calls,
        usage,
        raw: resp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::adapter::adapter_for;
    use crate::provider::{ChatMessage, ErrorKind, ModelId, Provider, ToolSpec};
    use std::collections::BTreeMap;

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            model: ModelId::parse(model).unwrap(),
            messages: vec![
                ChatMessage::system("You are terse."),
                ChatMessage::user("Hi"),
            ],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
            tool_choice: None,
        }
    }

    #[test]
    fn test_groq_request() {
        let creds = ResolvedCredentials::new("gsk");
        let spec = adapter_for(Provider::Groq)
            .build_request(&request("groq/llama3-70b-8192"), &creds)
            .unwrap();
        assert_eq!(spec.url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(spec.get_header("Authorization"), Some("Bearer gsk"));
        assert_eq!(spec.body["model"], "llama3-70b-8192");
        assert_eq!(spec.body["messages"][0]["role"], "system");
        assert_eq!(spec.body["messages"][1]["content"], "Hi");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let creds = ResolvedCredentials::new("k");
        let spec = adapter_for(Provider::Mistral)
            .build_request(&request("mistral/mistral-large-latest"), &creds)
            .unwrap();
        let obj = spec.body.as_object().unwrap();
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("tool_choice"));
        assert!(!obj.contains_key("max_tokens"));
    }

    #[test]
    fn test_openrouter_keeps_nested_model_name_and_headers() {
        let mut creds = ResolvedCredentials::new("or");
        creds.headers = BTreeMap::from([("X-Title".to_string(), "Orion".to_string())]);
        let spec = adapter_for(Provider::OpenRouter)
            .build_request(&request("openrouter/deepseek/deepseek-chat-v3-0324:free"), &creds)
            .unwrap();
        assert_eq!(spec.body["model"], "deepseek/deepseek-chat-v3-0324:free");
        assert_eq!(spec.get_header("X-Title"), Some("Orion"));
    }

    #[test]
    fn test_api_base_override() {
        let mut creds = ResolvedCredentials::new("k");
        creds.api_base = Some("http://localhost:9999/v1/".into());
        let spec = adapter_for(Provider::TogetherAi)
            .build_request(&request("together_ai/Qwen/Qwen2-72B-Instruct"), &creds)
            .unwrap();
        assert_eq!(spec.url, "http://localhost:9999/v1/chat/completions");
        assert_eq!(spec.body["model"], "Qwen/Qwen2-72B-Instruct");
    }

    #[test]
    fn test_tools_and_choice() {
        let mut req = request("groq/llama3-70b-8192");
        req.tools = vec![ToolSpec {
            name: "search".into(),
            description: "Search the web".into(),
            parameters: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        }];
        req.tool_choice = Some(ToolChoice::Function("search".into()));
        req.max_tokens = Some(256);
        let body = chat_body(&req).unwrap();
        assert_eq!(body["tools"][0]["function"]["name"], "search");
        assert_eq!(body["tool_choice"]["function"]["name"], "search");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_parse_content_and_usage() {
        let resp = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let c = parse_chat_completion(resp).unwrap();
        assert_eq!(c.content, "Hello!");
        assert_eq!(c.usage.unwrap().total(), 15);
    }

    #[test]
    fn test_parse_tool_calls_without_content() {
        let resp = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}
                }]
            }}]
        });
        let c = parse_chat_completion(resp).unwrap();
        assert_eq!(c.content, "");
        assert_eq!(c.tool_calls[0].id, "call_1");
        assert_eq!(c.tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn test_parse_missing_choices() {
        let err = parse_chat_completion(json!({"id": "x"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_empty_content() {
        let err = parse_chat_completion(json!({"choices": [{"message": {"content": ""}}]}))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }
}
