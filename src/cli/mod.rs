// src/cli/mod.rs — CLI definition (clap derive)

pub mod generate;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "orion-gateway",
    about = "Multi-provider LLM gateway with ordered fallback",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a completion, falling back across providers
    Generate {
        /// Start from this model, then its fallback chain
        #[arg(short, long, conflicts_with = "request_type")]
        model: Option<String>,

        /// Use the preferred models for this request type
        #[arg(short = 't', long)]
        request_type: Option<String>,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(long, default_value = "0.7")]
        temperature: f32,

        /// 0 = provider default
        #[arg(long, default_value = "0")]
        max_tokens: u32,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// The prompt
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Send the same prompt to several models concurrently
    Compare {
        /// Models to compare (repeatable)
        #[arg(short, long = "model", required = true)]
        models: Vec<String>,

        #[arg(short, long)]
        system: Option<String>,

        #[arg(long, default_value = "0.7")]
        temperature: f32,

        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Probe models with a tiny prompt
    Health {
        /// Models to probe (repeatable); defaults to the default preference list and its chain
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Probe every model named in the fallback and preference tables
        #[arg(long, conflicts_with = "models")]
        all: bool,

        /// Also pick a primary model for this request type
        #[arg(short = 't', long)]
        request_type: Option<String>,
    },
    /// Show which API key variables are set
    Keys,
}
