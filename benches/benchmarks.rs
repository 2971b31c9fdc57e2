// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// The gateway's own overhead per candidate:
//   1. Request building — normalized request to provider wire format
//   2. Response parsing — provider JSON back to a Completion
//   3. Startup — built-in tables plus a config overlay

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use orion_gateway::infra::config::Config;
use orion_gateway::provider::adapter::adapter_for;
use orion_gateway::provider::credentials::ResolvedCredentials;
use orion_gateway::provider::transport::HttpResponse;
use orion_gateway::provider::{ChatMessage, ChatRequest, ModelId};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// A conversation with `turns` user/assistant exchanges.
fn conversation(model: &str, turns: usize) -> ChatRequest {
    let mut messages = vec![ChatMessage::system("You are a careful career advisor.")];
    for i in 0..turns {
        messages.push(ChatMessage::user(format!(
            "Question {i}: how should I describe project {} on my CV?",
            i % 7
        )));
        messages.push(ChatMessage::assistant(format!(
            "Answer {i}: lead with the outcome, then the stack."
        )));
    }
    messages.push(ChatMessage::user("Summarize the advice."));

    ChatRequest {
        model: ModelId::parse(model).unwrap(),
        messages,
        temperature: 0.7,
        max_tokens: Some(1024),
        tools: vec![],
        tool_choice: None,
    }
}

fn credentials() -> ResolvedCredentials {
    let mut creds = ResolvedCredentials::new("bench-key");
    creds.endpoint = Some("https://bench.openai.azure.com".into());
    creds
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_build_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_request");
    let creds = credentials();

    for model in [
        "groq/llama3-70b-8192",
        "azure/gpt-4.1",
        "gemini/gemini-1.5-pro-latest",
        "cohere/command-r-plus",
    ] {
        let request = conversation(model, 20);
        let adapter = adapter_for(request.model.provider());
        group.bench_function(model, |b| {
            b.iter(|| adapter.build_request(black_box(&request), &creds))
        });
    }
    group.finish();
}

fn bench_parse_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_response");

    let content = "Lead with outcomes. ".repeat(200);
    let openai = HttpResponse::new(
        200,
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 800}
        })
        .to_string(),
    );
    let gemini = HttpResponse::new(
        200,
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": content}]}}],
            "usageMetadata": {"promptTokenCount": 900, "candidatesTokenCount": 800}
        })
        .to_string(),
    );

    let groq = adapter_for(ModelId::parse("groq/x").unwrap().provider());
    let google = adapter_for(ModelId::parse("gemini/x").unwrap().provider());

    group.bench_function("openai_compat", |b| {
        b.iter(|| groq.parse_response(black_box(&openai)))
    });
    group.bench_function("gemini", |b| {
        b.iter(|| google.parse_response(black_box(&gemini)))
    });
    group.finish();
}

fn bench_startup(c: &mut Criterion) {
    let toml_str = r#"
[fallbacks]
default = ["groq/llama3-70b-8192", "mistral/mistral-large-latest"]

[preferences]
ASK_QUESTION = ["groq/llama3-70b-8192", "azure/gpt-4.1"]
"#;
    c.bench_function("config_parse_and_tables", |b| {
        b.iter(|| {
            let config = Config::parse(black_box(toml_str)).unwrap();
            (config.catalog().unwrap(), config.registry().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_build_request,
    bench_parse_response,
    bench_startup,
);
criterion_main!(benches);
