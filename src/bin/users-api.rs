// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! CRUD demo service: create and list users over HTTP.

use std::sync::Arc;

use clap::Parser;

use beacon::api::users;
use beacon::telemetry::{init_logging, LoggingConfig, SpanStatus, Telemetry};

/// Users API - instrumented CRUD demo.
#[derive(Parser)]
#[command(name = "users-api", version, about = "Instrumented CRUD demo service")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "USERS_API_ADDR", default_value = "127.0.0.1:8000")]
    addr: String,

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

    {
        let mut span = telemetry.span("initialize_store");
        telemetry.logger().info("initializing user store", Vec::new());
        let _ = span.set_attribute("backend", "memory");
        let _ = span.close(SpanStatus::Ok);
    }

    let app = users::router(telemetry)?;
    let listener = tokio::net::TcpListener::bind(&cli.addr).await?;
    tracing::info!(addr = %cli.addr, "users-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
