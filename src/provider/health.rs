// src/provider/health.rs — Key report, health probes, primary-model selection

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use super::fallback::{Gateway, GenerateRequest, Target};
use super::registry::ModelRegistry;
use super::{ChatMessage, ChatResult, ErrorInfo, ErrorKind, ModelId, Provider};
use crate::infra::errors::GatewayError;

const PROBE_PROMPT: &str = "Say hello.";
const PROBE_TEMPERATURE: f32 = 0.2;
const PROBE_MAX_TOKENS: u32 = 32;

/// Whether a model's API key variable is set. Never carries the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub model: ModelId,
    pub provider: Provider,
    pub api_key_env: String,
    pub present: bool,
}

/// One row per catalog model, in catalog order.
pub fn credential_report(gateway: &Gateway) -> Vec<KeyStatus> {
    let resolver = gateway.resolver();
    resolver
        .catalog()
        .iter()
        .map(|(model, config)| KeyStatus {
            model: model.clone(),
            provider: model.provider(),
            api_key_env: config.api_key_env.clone(),
            present: resolver.has_api_key(model),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy { latency: Duration },
    NotConfigured,
    Failing(ErrorInfo),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub model: ModelId,
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
}

fn probe_request(model: &ModelId) -> GenerateRequest {
    GenerateRequest::new(
        Target::Exact(model.clone()),
        vec![ChatMessage::user(PROBE_PROMPT)],
    )
    .with_temperature(PROBE_TEMPERATURE)
    .with_max_tokens(PROBE_MAX_TOKENS)
}

fn classify(result: ChatResult, latency: Duration) -> HealthStatus {
    if result.success {
        return HealthStatus::Healthy { latency };
    }
    // Single-model runs record exactly one failure; surface it directly.
    match result.failures.into_iter().next() {
        Some(f) if f.error.kind == ErrorKind::NotConfigured => HealthStatus::NotConfigured,
        Some(f) => HealthStatus::Failing(f.error),
        None => HealthStatus::Failing(
            result
                .error
                .unwrap_or_else(|| ErrorInfo::new(ErrorKind::AllProvidersExhausted, "no result")),
        ),
    }
}

/// Probe each model once, concurrently, with no fallbacks.
pub async fn health_check(gateway: &Gateway, models: &[ModelId]) -> Vec<HealthReport> {
    let probes = models.iter().map(|model| async move {
        let started = tokio::time::Instant::now();
        let result = gateway.generate(probe_request(model)).await;
        let status = classify(result, started.elapsed());
        match &status {
            HealthStatus::Healthy { latency } => {
                tracing::info!(model = %model, latency_ms = latency.as_millis() as u64, "Healthy")
            }
            HealthStatus::NotConfigured => tracing::debug!(model = %model, "Not configured"),
            HealthStatus::Failing(e) => tracing::warn!(model = %model, "Failing: {e}"),
        }
        HealthReport {
            model: model.clone(),
            status,
            checked_at: Utc::now(),
        }
    });
    join_all(probes).await
}

pub fn healthy_models(reports: &[HealthReport]) -> Vec<ModelId> {
    reports
        .iter()
        .filter(|r| r.status.is_healthy())
        .map(|r| r.model.clone())
        .collect()
}

/// First healthy model in the request type's preference order, else the
/// first healthy model at all.
pub fn select_primary(
    registry: &ModelRegistry,
    request_type: &str,
    healthy: &[ModelId],
) -> Result<ModelId, GatewayError> {
    registry
        .preferred_models_for(request_type)
        .iter()
        .find(|m| healthy.contains(m))
        .or_else(|| healthy.first())
        .cloned()
        .ok_or(GatewayError::NoHealthyModels)
}
