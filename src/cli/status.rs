// src/cli/status.rs — `health` and `keys` commands

use crate::provider::fallback::Gateway;
use crate::provider::health::{self, HealthStatus};
use crate::provider::registry::DEFAULT_KEY;
use crate::provider::ModelId;

/// Default probe set: the default preferences, then the default chain.
pub fn default_probe_models(gateway: &Gateway) -> Vec<ModelId> {
    let registry = gateway.registry();
    let mut models: Vec<ModelId> = registry.preferred_models_for(DEFAULT_KEY).to_vec();
    if let Some(first) = models.first().cloned() {
        for m in registry.fallbacks_for(&first) {
            if !models.contains(m) {
                models.push(m.clone());
            }
        }
    }
    models
}

/// Models named on the command line, every model in the tables with `all`,
/// or the default probe set.
pub fn probe_models(gateway: &Gateway, models: &[String], all: bool) -> anyhow::Result<Vec<ModelId>> {
    if !models.is_empty() {
        return Ok(models
            .iter()
            .map(|m| ModelId::parse(m))
            .collect::<Result<Vec<_>, _>>()?);
    }
    if all {
        return Ok(gateway.registry().known_models());
    }
    Ok(default_probe_models(gateway))
}

pub async fn show_health(
    gateway: &Gateway,
    models: &[String],
    all: bool,
    request_type: Option<&str>,
) -> anyhow::Result<()> {
    let models = probe_models(gateway, models, all)?;

    let reports = health::health_check(gateway, &models).await;

    println!("orion-gateway v{}", env!("CARGO_PKG_VERSION"));
    println!();
    for report in &reports {
        let status = match &report.status {
            HealthStatus::Healthy { latency } => format!("ok ({}ms)", latency.as_millis()),
            HealthStatus::NotConfigured => "not configured".to_string(),
            HealthStatus::Failing(e) => format!("failing: {e}"),
        };
        println!(
            "  {:<50} {}  [{}]",
            report.model.as_str(),
            status,
            report.checked_at.format("%H:%M:%S")
        );
    }

    let healthy = health::healthy_models(&reports);
    println!();
    println!("  Healthy: {}/{}", healthy.len(), reports.len());

    if let Some(request_type) = request_type {
        if !gateway.registry().request_types().any(|t| t == request_type) {
            println!("  Unknown request type {request_type}; using default preferences");
        }
        let primary = health::select_primary(gateway.registry(), request_type, &healthy)?;
        println!("  Primary for {request_type}: {primary}");
    }
    Ok(())
}

pub fn show_keys(gateway: &Gateway) {
    println!("  {:<14} {:<50} {:<28} Set", "Provider", "Model", "Variable");
    for row in health::credential_report(gateway) {
        println!(
            "  {:<14} {:<50} {:<28} {}",
            row.model.provider().display_name(),
            row.model.as_str(),
            row.api_key_env,
            if row.present { "yes" } else { "no" }
        );
    }
}
