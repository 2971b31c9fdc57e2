// src/provider/google.rs — Google Generative AI (Gemini) adapter

use serde_json::json;

use super::adapter::{parse_json, validate_tools, ProviderAdapter};
use super::credentials::ResolvedCredentials;
use super::transport::{HttpRequestSpec, HttpResponse};
use super::{ChatRequest, Completion, ErrorInfo, Role, TokenUsage, ToolCall, ToolChoice};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAdapter;

impl GeminiAdapter {
    /// Gemini knows only `user` and `model` turns and expects them to
    /// alternate. System and tool messages become user turns; consecutive
    /// turns with the same role are merged into one multi-part turn.
    fn build_contents(request: &ChatRequest) -> Vec<serde_json::Value> {
        let mut contents: Vec<(&'static str, Vec<serde_json::Value>)> = Vec::new();

        for m in &request.messages {
            let role = match m.role {
                Role::System | Role::User | Role::Tool => "user",
                Role::Assistant => "model",
            };
            let part = json!({ "text": m.content });
            if let Some((last_role, parts)) = contents.last_mut() {
                if *last_role == role {
                    parts.push(part);
                    continue;
                }
            }
            contents.push((role, vec![part]));
        }

        contents
            .into_iter()
            .map(|(role, parts)| json!({ "role": role, "parts": parts }))
            .collect()
    }

    fn build_body(request: &ChatRequest) -> Result<serde_json::Value, ErrorInfo> {
        validate_tools(request)?;

        let mut gen_config = json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            gen_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": Self::build_contents(request),
            "generationConfig": gen_config,
        });

        // Tools (function calling)
        if !request.tools.is_empty() {
            let function_declarations: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": function_declarations }]);
        }
        if let Some(choice) = &request.tool_choice {
            let config = match choice {
                ToolChoice::Auto => json!({ "mode": "AUTO" }),
                ToolChoice::None => json!({ "mode": "NONE" }),
                ToolChoice::Required => json!({ "mode": "ANY" }),
                ToolChoice::Function(name) => json!({
                    "mode": "ANY",
                    "allowedFunctionNames": [name],
                }),
            };
            body["toolConfig"] = json!({ "functionCallingConfig": config });
        }

        Ok(body)
    }
}

impl ProviderAdapter for GeminiAdapter {
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
        let url = format!("{base}/models/{}:generateContent", request.model.name());

        let spec = HttpRequestSpec::post(url, Self::build_body(request)?)
            .header("x-goog-api-key", credentials.api_key.clone());
        Ok(credentials
            .headers
            .iter()
            .fold(spec, |spec, (k, v)| spec.header(k.clone(), v.clone())))
    }

    fn parse_response(&self, response: &HttpResponse) -> Result<Completion, ErrorInfo> {
        let resp = parse_json(response)?;

        let Some(parts) = resp
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
        else {
            let reason = resp["promptFeedback"]["blockReason"]
                .as_str()
                .or_else(|| resp["candidates"][0]["finishReason"].as_str())
                .unwrap_or("no candidates");
            return Err(ErrorInfo::invalid_response(format!(
                "Gemini returned no content ({reason})"
            )));
        };

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().unwrap_or("").to_string();
                tool_calls.push(ToolCall {
                    id: name.clone(),
                    name,
                    arguments: fc["args"].clone(),
                });
            }
        }

        if content.trim().is_empty() && tool_calls.is_empty() {
            return Err(ErrorInfo::invalid_response("Gemini returned empty content"));
        }

        let usage = resp["usageMetadata"].is_object().then(|| TokenUsage {
            input_tokens: resp["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
            output_tokens: resp["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        });

        Ok(Completion {
            content,
            tool_calls,
            usage,
            raw: resp,
        })
    }
}
