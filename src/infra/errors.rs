// src/infra/errors.rs — Error types for the gateway's setup paths
//
// Runtime provider failures are `provider::ErrorInfo` values recorded by the
// fallback engine. These errors are for configuration and startup, where
// failing loudly is the right call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown provider '{provider}' in model id '{model}'{}", suggestion_suffix(.suggestion))]
    UnknownProvider {
        model: String,
        provider: String,
        suggestion: Option<String>,
    },

    #[error("Invalid model id '{0}': expected 'provider/model-name'")]
    InvalidModelId(String),

    #[error("No healthy models available")]
    NoHealthyModels,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{s}'?"),
        None => String::new(),
    }
}
