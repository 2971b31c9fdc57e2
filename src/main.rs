// src/main.rs — orion-gateway entry point

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use orion_gateway::cli::generate::{self, PromptArgs};
use orion_gateway::cli::{status, Cli, Commands};
use orion_gateway::infra::config::Config;
use orion_gateway::infra::logger;
use orion_gateway::provider::credentials::ProcessEnv;
use orion_gateway::provider::fallback::Gateway;
use orion_gateway::provider::transport::ReqwestTransport;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    let gateway = Gateway::from_config(
        &config,
        Arc::new(ReqwestTransport::new()),
        Arc::new(ProcessEnv),
    )?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Generate {
            model,
            request_type,
            system,
            temperature,
            max_tokens,
            json,
            prompt,
        } => {
            let target = generate::target_from_args(model.as_deref(), request_type.as_deref())?;
            let args = PromptArgs {
                system,
                prompt,
                temperature,
                max_tokens,
            };
            generate::run_generate(&gateway, target, &args, json, &cancel).await
        }
        Commands::Compare {
            models,
            system,
            temperature,
            prompt,
        } => {
            let args = PromptArgs {
                system,
                prompt,
                temperature,
                max_tokens: 0,
            };
            generate::run_compare(&gateway, &models, &args, &cancel).await
        }
        Commands::Health {
            models,
            all,
            request_type,
        } => {
            status::show_health(&gateway, &models, all, request_type.as_deref()).await?;
            Ok(true)
        }
        Commands::Keys => {
            status::show_keys(&gateway);
            Ok(true)
        }
    }
}
