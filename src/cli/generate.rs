// src/cli/generate.rs — `generate` and `compare` commands

use tokio_util::sync::CancellationToken;

use crate::provider::fallback::{Gateway, GenerateRequest, Target};
use crate::provider::registry::DEFAULT_KEY;
use crate::provider::{ChatMessage, ChatResult, ModelId};

pub struct PromptArgs {
    pub system: Option<String>,
    pub prompt: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptArgs {
    fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.prompt.join(" ")));
        messages
    }

    fn request(&self, target: Target) -> GenerateRequest {
        GenerateRequest::new(target, self.messages())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// Neither flag means the default request-type preferences.
pub fn target_from_args(
    model: Option<&str>,
    request_type: Option<&str>,
) -> anyhow::Result<Target> {
    Ok(match (model, request_type) {
        (Some(m), _) => Target::Model(ModelId::parse(m)?),
        (None, Some(t)) => Target::RequestType(t.to_string()),
        (None, None) => Target::RequestType(DEFAULT_KEY.to_string()),
    })
}

/// Returns whether generation succeeded.
pub async fn run_generate(
    gateway: &Gateway,
    target: Target,
    args: &PromptArgs,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<bool> {
    let result = gateway
        .generate_with_cancel(args.request(target), cancel)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(result.success)
}

pub async fn run_compare(
    gateway: &Gateway,
    models: &[String],
    args: &PromptArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<bool> {
    let models = models
        .iter()
        .map(|m| ModelId::parse(m))
        .collect::<Result<Vec<_>, _>>()?;
    // Target is replaced per model.
    let request = args.request(Target::RequestType(DEFAULT_KEY.to_string()));

    let results = gateway
        .compare_with_cancel(&models, &request, cancel)
        .await;

    for (model, result) in models.iter().zip(&results) {
        println!("── {model} ──");
        print_result(result);
        println!();
    }
    Ok(results.iter().any(|r| r.success))
}

fn print_result(result: &ChatResult) {
    if result.success {
        if let Some(content) = &result.content {
            println!("{content}");
        }
        for call in &result.tool_calls {
            println!("[tool call] {}({})", call.name, call.arguments);
        }
        if let Some(model) = &result.model_used {
            let tokens = result
                .usage
                .map(|u| format!(", {} tokens", u.total()))
                .unwrap_or_default();
            eprintln!("  (via {model}{tokens})");
        }
    } else if let Some(error) = &result.error {
        eprintln!("error: {}", error.message);
        for failure in &result.failures {
            eprintln!("  {:<50} {}", failure.model.as_str(), failure.error);
        }
    }
}
