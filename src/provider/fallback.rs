// src/provider/fallback.rs — Fallback execution engine
//
// Walks an ordered candidate queue, one model at a time, until one succeeds.
// Per-candidate failures are recorded and never escape; the caller only ever
// sees a success, the aggregate exhaustion error, or a cancellation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::adapter::adapter_for;
use super::credentials::{CredentialResolver, EnvSource, ResolvedCredentials};
use super::registry::ModelRegistry;
use super::retry::{tag_provider, RetryLayer};
use super::transport::HttpTransport;
use super::{
    CandidateFailure, ChatMessage, ChatRequest, ChatResult, Completion, ErrorInfo, ErrorKind,
    ModelId, ToolChoice, ToolSpec,
};
use crate::infra::config::{Config, TimeoutConfig};
use crate::infra::errors::GatewayError;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TEMPERATURE: f32 = 2.0;
/// Roughly 30 years; stands in for "no deadline".
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// What the caller wants answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// The request type's preferred models, in order.
    RequestType(String),
    /// This model, then its fallback chain.
    Model(ModelId),
    /// This model only.
    Exact(ModelId),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::RequestType(t) => write!(f, "request type {t}"),
            Target::Model(m) => write!(f, "{m}"),
            Target::Exact(m) => write!(f, "{m} (no fallback)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub target: Target,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

impl GenerateRequest {
    pub fn new(target: Target, messages: Vec<ChatMessage>) -> Self {
        Self {
            target,
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn for_request_type(request_type: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self::new(Target::RequestType(request_type.into()), messages)
    }

    pub fn for_model(model: ModelId, messages: Vec<ChatMessage>) -> Self {
        Self::new(Target::Model(model), messages)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = clamp_temperature(temperature);
        self
    }

    /// Zero means "provider default".
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = (max_tokens > 0).then_some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>, tool_choice: Option<ToolChoice>) -> Self {
        self.tools = tools;
        self.tool_choice = tool_choice;
        self
    }

    fn chat_request(&self, model: ModelId) -> ChatRequest {
        ChatRequest {
            model,
            messages: self.messages.clone(),
            temperature: clamp_temperature(self.temperature),
            max_tokens: self.max_tokens.filter(|n| *n > 0),
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
        }
    }
}

fn clamp_temperature(t: f32) -> f32 {
    if t.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        t.clamp(0.0, MAX_TEMPERATURE)
    }
}

/// The gateway: registry + credentials + retrying transport.
///
/// Stateless across calls apart from the credential cache, so one instance
/// can serve any number of concurrent `generate` calls.
pub struct Gateway {
    registry: Arc<ModelRegistry>,
    resolver: Arc<CredentialResolver>,
    retry: RetryLayer,
    budget: Duration,
    request_timeout: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<ModelRegistry>,
        resolver: Arc<CredentialResolver>,
        retry: RetryLayer,
    ) -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            registry,
            resolver,
            retry,
            budget: timeouts.budget(),
            request_timeout: timeouts.request(),
        }
    }

    pub fn from_config(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        env: Arc<dyn EnvSource>,
    ) -> Result<Self, GatewayError> {
        let catalog = Arc::new(config.catalog()?);
        let registry = Arc::new(config.registry()?);
        let resolver = Arc::new(CredentialResolver::new(catalog, env));
        let retry = RetryLayer::with_config(transport, config.retry.to_retry_config());

        Ok(Self::new(registry, resolver, retry)
            .with_budget(config.timeouts.budget())
            .with_request_timeout(config.timeouts.request()))
    }

    /// Wall-clock limit for one whole candidate sequence.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// The ordered, duplicate-free list of models to try for `target`.
    pub fn candidate_queue(&self, target: &Target) -> Vec<ModelId> {
        let raw: Vec<ModelId> = match target {
            Target::RequestType(t) => self.registry.preferred_models_for(t).to_vec(),
            Target::Model(m) => std::iter::once(m)
                .chain(self.registry.fallbacks_for(m))
                .cloned()
                .collect(),
            Target::Exact(m) => vec![m.clone()],
        };

        let mut seen = HashSet::new();
        raw.into_iter().filter(|m| seen.insert(m.clone())).collect()
    }

    pub async fn generate(&self, request: GenerateRequest) -> ChatResult {
        self.generate_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like `generate`, but stops as soon as `cancel` fires: the in-flight
    /// call is dropped and no further candidate is started.
    pub async fn generate_with_cancel(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> ChatResult {
        let span = tracing::info_span!(
            "generate",
            request_id = %Uuid::new_v4(),
            target = %request.target,
        );
        self.run(&request, cancel).instrument(span).await
    }

    async fn run(&self, request: &GenerateRequest, cancel: &CancellationToken) -> ChatResult {
        let queue = self.candidate_queue(&request.target);
        let deadline = deadline_after(self.budget);
        let mut failures: Vec<CandidateFailure> = Vec::new();
        let mut attempted: HashSet<ModelId> = HashSet::new();

        tracing::debug!(candidates = queue.len(), "Starting generation");

        for model in queue {
            if cancel.is_cancelled() {
                return cancelled(failures);
            }
            if Instant::now() >= deadline {
                tracing::warn!(budget_ms = self.budget.as_millis() as u64, "Budget spent");
                break;
            }
            if !attempted.insert(model.clone()) {
                continue;
            }

            let credentials = match self.resolver.resolve(&model) {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(model = %model, "Skipping: {}", e.message);
                    failures.push(CandidateFailure { model, error: e });
                    continue;
                }
            };

            let chat = request.chat_request(model.clone());
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(failures),
                r = tokio::time::timeout_at(deadline, self.attempt(&chat, &credentials)) => r,
            };

            match outcome {
                Ok(Ok(completion)) => {
                    tracing::info!(model = %model, skipped = failures.len(), "Generation succeeded");
                    return ChatResult::succeeded(model, completion, failures);
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        model = %model,
                        kind = %error.kind,
                        status = error.http_status,
                        "Provider failed, trying fallback: {}",
                        error.message
                    );
                    failures.push(CandidateFailure { model, error });
                }
                Err(_) => {
                    let error = ErrorInfo::timeout(format!(
                        "Budget of {}s expired while waiting on {model}",
                        self.budget.as_secs()
                    ))
                    .with_provider(model.provider().prefix());
                    tracing::warn!(model = %model, "Budget expired mid-call");
                    failures.push(CandidateFailure { model, error });
                    break;
                }
            }
        }

        exhausted(&request.target, failures)
    }

    /// One candidate: build, send through the retry layer, parse.
    async fn attempt(
        &self,
        chat: &ChatRequest,
        credentials: &ResolvedCredentials,
    ) -> Result<Completion, ErrorInfo> {
        let provider = chat.model.provider().prefix();
        let adapter = adapter_for(chat.model.provider());

        let mut spec = adapter
            .build_request(chat, credentials)
            .map_err(|e| tag_provider(e, provider))?;
        spec.timeout = Some(self.request_timeout);

        let response = self.retry.send(&spec, provider).await?;
        adapter
            .parse_response(&response)
            .map_err(|e| tag_provider(e, provider).with_status(response.status))
    }

    /// Run `request` against each model independently and concurrently.
    /// Results come back in the order of `models`.
    pub async fn compare(&self, models: &[ModelId], request: &GenerateRequest) -> Vec<ChatResult> {
        self.compare_with_cancel(models, request, &CancellationToken::new())
            .await
    }

    pub async fn compare_with_cancel(
        &self,
        models: &[ModelId],
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Vec<ChatResult> {
        let runs = models.iter().map(|m| {
            let mut single = request.clone();
            single.target = Target::Exact(m.clone());
            async move { self.generate_with_cancel(single, cancel).await }
        });
        join_all(runs).await
    }
}

fn cancelled(failures: Vec<CandidateFailure>) -> ChatResult {
    tracing::info!("Generation cancelled");
    ChatResult::failed(
        ErrorInfo::new(ErrorKind::Cancelled, "Generation was cancelled"),
        failures,
    )
}

fn exhausted(target: &Target, failures: Vec<CandidateFailure>) -> ChatResult {
    let message = if failures.is_empty() {
        format!("No candidate models for {target}")
    } else {
        let detail: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.model, f.error))
            .collect();
        format!("All providers failed for {target}: {}", detail.join("; "))
    };
    tracing::error!(attempts = failures.len(), "All providers exhausted");
    ChatResult::failed(
        ErrorInfo::new(ErrorKind::AllProvidersExhausted, message),
        failures,
    )
}

/// `now + budget`, saturating to a far-future instant for huge budgets.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::credentials::ModelCatalog;
    use crate::provider::transport::{HttpRequestSpec, HttpResponse};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, HashMap};

    struct NeverCalled;

    #[async_trait]
    impl HttpTransport for NeverCalled {
        async fn send(&self, _request: &HttpRequestSpec) -> Result<HttpResponse, ErrorInfo> {
            panic!("transport should not be called");
        }
    }

    fn id(s: &str) -> ModelId {
        ModelId::parse(s).unwrap()
    }

    fn gateway(chains: &[(&str, &[&str])], prefs: &[(&str, &[&str])]) -> Gateway {
        let table = |rows: &[(&str, &[&str])]| -> BTreeMap<String, Vec<String>> {
            rows.iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect()
        };
        let registry = ModelRegistry::from_tables(&table(chains), &table(prefs)).unwrap();
        let resolver = CredentialResolver::new(
            Arc::new(ModelCatalog::builtin().unwrap()),
            Arc::new(HashMap::<String, String>::new()),
        );
        Gateway::new(
            Arc::new(registry),
            Arc::new(resolver),
            RetryLayer::new(Arc::new(NeverCalled)),
        )
    }

    #[test]
    fn test_queue_for_model_appends_chain() {
        let g = gateway(
            &[("azure/gpt-4.1", &["azure/DeepSeek-R1", "groq/llama3-70b-8192"])],
            &[],
        );
        let queue = g.candidate_queue(&Target::Model(id("azure/gpt-4.1")));
        assert_eq!(
            queue,
            vec![
                id("azure/gpt-4.1"),
                id("azure/DeepSeek-R1"),
                id("groq/llama3-70b-8192")
            ]
        );
    }

    #[test]
    fn test_queue_for_request_type_has_no_chains() {
        let g = gateway(
            &[("azure/gpt-4.1", &["mistral/mistral-large-latest"])],
            &[("JD_ANALYSIS", &["azure/gpt-4.1", "groq/gemma2-9b-it"])],
        );
        let queue = g.candidate_queue(&Target::RequestType("JD_ANALYSIS".into()));
        assert_eq!(queue, vec![id("azure/gpt-4.1"), id("groq/gemma2-9b-it")]);
    }

    #[test]
    fn test_queue_dedups_preserving_order() {
        let g = gateway(
            &[(
                "groq/gemma2-9b-it",
                &["groq/llama3-70b-8192", "groq/gemma2-9b-it", "groq/llama3-70b-8192"],
            )],
            &[],
        );
        let queue = g.candidate_queue(&Target::Model(id("groq/gemma2-9b-it")));
        assert_eq!(queue, vec![id("groq/gemma2-9b-it"), id("groq/llama3-70b-8192")]);
    }

    #[test]
    fn test_queue_exact_is_single() {
        let g = gateway(&[("default", &["groq/llama3-70b-8192"])], &[]);
        let queue = g.candidate_queue(&Target::Exact(id("cohere/command-r-plus")));
        assert_eq!(queue, vec![id("cohere/command-r-plus")]);
    }

    #[test]
    fn test_request_clamping() {
        let req = GenerateRequest::for_model(id("groq/gemma2-9b-it"), vec![])
            .with_temperature(5.0)
            .with_max_tokens(0);
        assert_eq!(req.temperature, 2.0);
        assert_eq!(req.max_tokens, None);

        let mut raw = req.clone();
        raw.temperature = -1.0;
        raw.max_tokens = Some(0);
        let chat = raw.chat_request(id("groq/gemma2-9b-it"));
        assert_eq!(chat.temperature, 0.0);
        assert_eq!(chat.max_tokens, None);
    }

    #[test]
    fn test_nan_temperature_uses_default() {
        assert_eq!(clamp_temperature(f32::NAN), DEFAULT_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_empty_queue_is_exhausted_without_calls() {
        let g = gateway(&[], &[]);
        let result = g
            .generate(GenerateRequest::for_request_type(
                "UNKNOWN",
                vec![ChatMessage::user("hi")],
            ))
            .await;
        assert!(!result.success);
        let err = result.error.unwrap();
        assert_eq!(err.kind, ErrorKind::AllProvidersExhausted);
        assert!(err.message.contains("No candidate models"));
    }

    #[tokio::test]
    async fn test_all_unconfigured_never_touches_transport() {
        let g = gateway(&[], &[("ASK_QUESTION", &["groq/llama3-70b-8192", "cohere/command-r-plus"])]);
        let result = g
            .generate(GenerateRequest::for_request_type(
                "ASK_QUESTION",
                vec![ChatMessage::user("hi")],
            ))
            .await;
        assert!(!result.success);
        assert_eq!(result.failures.len(), 2);
        assert!(result
            .failures
            .iter()
            .all(|f| f.error.kind == ErrorKind::NotConfigured));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let g = gateway(&[], &[("ASK_QUESTION", &["groq/llama3-70b-8192"])]);
        let token = CancellationToken::new();
        token.cancel();
        let result = g
            .generate_with_cancel(
                GenerateRequest::for_request_type("ASK_QUESTION", vec![ChatMessage::user("hi")]),
                &token,
            )
            .await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::Cancelled);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_deadline_saturates_on_huge_budget() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > Instant::now() + Duration::from_secs(86_400 * 365));
    }

    #[tokio::test]
    async fn test_huge_budget_does_not_panic() {
        let g = gateway(&[], &[("ASK_QUESTION", &["groq/llama3-70b-8192"])])
            .with_budget(Duration::from_secs(u64::MAX));
        let result = g
            .generate(GenerateRequest::for_request_type(
                "ASK_QUESTION",
                vec![ChatMessage::user("hi")],
            ))
            .await;
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].error.kind, ErrorKind::NotConfigured);
    }
}
