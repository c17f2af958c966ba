// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LLM-proxy demo service: text generation over an OpenAI-compatible API.

use std::sync::Arc;

use clap::Parser;

use beacon::api::generate;
use beacon::llm::{LlmClient, DEFAULT_MODEL, OPENAI_BASE_URL};
use beacon::telemetry::{init_logging, LoggingConfig, Telemetry};

/// LLM API - instrumented text-generation proxy.
#[derive(Parser)]
#[command(name = "llm-api", version, about = "Instrumented LLM-proxy demo service")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "LLM_API_ADDR", default_value = "127.0.0.1:8001")]
    addr: String,

    /// Base URL of the chat-completions endpoint
    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL)]
    base_url: String,

    /// API key for the endpoint, if it needs one
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model used when a request does not name one
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Emit JSON logs for shipping
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> beacon::Result<()> {
    let cli = Cli::parse();
    let config = if cli.json_logs {
        LoggingConfig::production()
    } else {
        LoggingConfig::default()
    };
    let _guard = init_logging(&config)?;

    let telemetry = Arc::new(Telemetry::new());
    let client = Arc::new(LlmClient::new(
        cli.base_url.clone(),
        cli.api_key.clone(),
        telemetry.clone(),
    )?);

    let app = generate::router(telemetry, client, cli.model);
    let listener = tokio::net::TcpListener::bind(&cli.addr).await?;
    tracing::info!(addr = %cli.addr, base_url = %cli.base_url, "llm-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
