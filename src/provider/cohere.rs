// src/provider/cohere.rs — Cohere v1 chat adapter
//
// Cohere takes the latest user turn as `message`, prior turns as
// `chat_history`, and system text as `preamble`.

use serde_json::json;

use super::adapter::{parse_json, validate_tools, ProviderAdapter};
use super::credentials::ResolvedCredentials;
use super::transport::{HttpRequestSpec, HttpResponse};
use super::{ChatRequest, Completion, ErrorInfo, Role, TokenUsage, ToolCall};

const BASE_URL: &str = "https://api.cohere.ai/v1";

pub struct CohereAdapter;

impl CohereAdapter {
    fn build_body(request: &ChatRequest) -> Result<serde_json::Value, ErrorInfo> {
        validate_tools(request)?;

        let preamble: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let turns: Vec<_> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();

        // The final user (or tool) turn is the message; everything before it is history.
        let split = turns
            .iter()
            .rposition(|m| matches!(m.role, Role::User | Role::Tool))
            .ok_or_else(|| ErrorInfo::invalid_request("Cohere requires at least one user message"))?;
        // `message` must be the final turn; v1 has no slot for trailing assistant text.
        if split + 1 < turns.len() {
            return Err(ErrorInfo::invalid_request(
                "Cohere requires the conversation to end with a user or tool turn",
            ));
        }

        let chat_history: Vec<serde_json::Value> = turns[..split]
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "CHATBOT",
                    _ => "USER",
                };
                json!({ "role": role, "message": m.content })
            })
            .collect();

        let mut body = json!({
            "model": request.model.name(),
            "message": turns[split].content,
            "temperature": request.temperature,
        });
        if !chat_history.is_empty() {
            body["chat_history"] = json!(chat_history);
        }
        if !preamble.is_empty() {
            body["preamble"] = json!(preamble.join("\n\n"));
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameter_definitions": parameter_definitions(&t.parameters),
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        // Cohere v1 has no tool_choice; the field is dropped.

        Ok(body)
    }
}

/// JSON Schema `properties`/`required` → Cohere `parameter_definitions`.
fn parameter_definitions(schema: &serde_json::Value) -> serde_json::Value {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut defs = serde_json::Map::new();
    if let Some(props) = schema["properties"].as_object() {
        for (name, prop) in props {
            defs.insert(
                name.clone(),
                json!({
                    "description": prop["description"].as_str().unwrap_or(""),
                    "type": prop["type"].as_str().unwrap_or("str"),
                    "required": required.contains(&name.as_str()),
                }),
            );
        }
    }
    serde_json::Value::Object(defs)
}

impl ProviderAdapter for CohereAdapter {
    fn build_request(
        &self,
        request: &ChatRequest,
        credentials: &ResolvedCredentials,
    ) -> Result<HttpRequestSpec, ErrorInfo> {
        let base = credentials
            .api_base
            .as_deref()
            .unwrap_or(BASE_URL)
            .trim_end_matches('/');
        let spec = HttpRequestSpec::post(format!("{base}/chat"), Self::build_body(request)?)
            .bearer(&credentials.api_key);
        Ok(credentials
            .headers
            .iter()
            .fold(spec, |spec, (k, v)| spec.header(k.clone(), v.clone())))
    }

    fn parse_response(&self, response: &HttpResponse) -> Result<Completion, ErrorInfo> {
        let resp = parse_json(response)?;

        let tool_calls: Vec<ToolCall> = resp["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let name = c["name"].as_str()?.to_string();
                        Some(ToolCall {
                            id: name.clone(),
                            name,
                            arguments: c["parameters"].clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content = match resp["text"].as_str() {
            Some(text) => text.to_string(),
            None if !tool_calls.is_empty() => String::new(),
            None => return Err(ErrorInfo::invalid_response("Cohere response has no text")),
        };
        if content.trim().is_empty() && tool_calls.is_empty() {
            return Err(ErrorInfo::invalid_response("Cohere returned empty text"));
        }

        let tokens = &resp["meta"]["billed_units"];
        let usage = tokens.is_object().then(|| TokenUsage {
            input_tokens: tokens["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: tokens["output_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(Completion {
            content,
            tool_calls,
            usage,
            raw: resp,
        })
    }
}
