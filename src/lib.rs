// src/lib.rs — Library root for the Orion LLM gateway

pub mod cli;
pub mod infra;
pub mod provider;
