// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Batch worker demo: simulated workloads and outbound fetches, with a
//! telemetry report at the end of the run.

use std::sync::Arc;

use clap::Parser;

use beacon::telemetry::{init_logging, CaptureSink, LoggingConfig, Telemetry};
use beacon::workloads::Workloads;

/// Worker - instrumented batch workload demo.
#[derive(Parser)]
#[command(name = "worker", version, about = "Instrumented batch worker demo")]
struct Cli {
    /// How many simulated workloads of each kind to run
    #[arg(long, default_value_t = 5)]
    iterations: u64,

    /// URL to fetch; repeatable. Defaults to a small httpbin set.
    #[arg(long = "url")]
    urls: Vec<String>,

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

    let capture = Arc::new(CaptureSink::new());
    let telemetry = Arc::new(Telemetry::with_sink(capture.clone()));
    let workloads = Workloads::new(telemetry);

    for n in 1..=cli.iterations {
        let w = workloads.clone();
        let result = tokio::task::spawn_blocking(move || w.process_data(n)).await??;
        tracing::info!(n, result, "data processed");
    }

    for task_id in 1..=cli.iterations {
        let slept = workloads.process_task(task_id).await?;
        tracing::info!(task_id, slept, "task processed");
    }

    let urls = if cli.urls.is_empty() {
        vec![
            "https://httpbin.org/get".to_string(),
            "https://httpbin.org/delay/1".to_string(),
            "https://httpbin.org/status/404".to_string(),
        ]
    } else {
        cli.urls
    };
    for url in &urls {
        // Failures are already on the telemetry path; the run continues.
        if let Ok(body) = workloads.fetch_data(url).await {
            tracing::info!(url = %url, bytes = body.len(), "fetched");
        }
    }

    println!("{}", capture.format_report());
    Ok(())
}
