// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Simulated batch workloads for the worker binary.
//!
//! Three shapes of work, all through the same operation wrapper: a CPU-bound
//! calculation (synchronous), a variable-duration simulated task
//! (suspendable), and an outbound HTTP fetch.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::Fault;
use crate::telemetry::Telemetry;

/// Outbound fetch timeout in seconds.
const FETCH_TIMEOUT_SECS: u64 = 5;

/// Simulated workload driver.
#[derive(Debug, Clone)]
pub struct Workloads {
    telemetry: Arc<Telemetry>,
    http: reqwest::Client,
}

impl Workloads {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self { telemetry, http }
    }

    /// Simulate a CPU-heavy calculation.
    ///
    /// Synchronous on purpose: this is the thread-per-call shape. Every
    /// fifth input is the "special case" that emits a warning record.
    pub fn process_data(&self, n: u64) -> Result<u64, Fault> {
        self.telemetry
            .operation("process_data")
            .run_blocking(|| {
                let logger = self.telemetry.logger();
                logger.info(
                    "processing data",
                    vec![("n".to_string(), n.to_string())],
                );
                let delay = rand::thread_rng().gen_range(0.2..0.6);
                std::thread::sleep(Duration::from_secs_f64(delay));
                if n % 5 == 0 {
                    logger.warning(
                        "special case encountered",
                        vec![("n".to_string(), n.to_string())],
                    );
                }
                Ok((0..n).map(|i| i * i).sum())
            })
    }

    /// Simulate a task of variable duration and return the seconds slept.
    ///
    /// The group label is bounded (`task_id % 3`), keeping metric
    /// cardinality fixed no matter how many tasks run.
    pub async fn process_task(&self, task_id: u64) -> Result<f64, Fault> {
        let duration = rand::thread_rng().gen_range(0.1..0.8);
        self.telemetry
            .operation("process_task")
            .label("task_type", "simulated")
            .label("task_group", (task_id % 3).to_string())
            .run(move || async move {
                tokio::time::sleep(Duration::from_secs_f64(duration)).await;
                Ok::<_, Fault>(duration)
            })
            .await
    }

    /// Make an outbound HTTP request with observability.
    pub async fn fetch_data(&self, url: &str) -> Result<String, Fault> {
        let http = self.http.clone();
        let target = url.to_string();
        self.telemetry
            .operation("fetch_data")
            .run(move || async move {
                let response = http.get(&target).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Fault::upstream(format!("{target} returned {status}")));
                }
                let body = response.text().await?;
                Ok(body)
            })
            .await
    }
}
