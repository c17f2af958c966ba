// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumented client for an OpenAI-compatible chat-completions endpoint.
//!
//! Works with OpenAI or any compatible API - just set the base URL. Every
//! call runs under the `llm.generate` operation with the model as its label;
//! token usage reported by the provider feeds the `llm_tokens_total`
//! counter, and a response without usage data is simply not counted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::telemetry::{Counter, MetricError, Telemetry};

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Text of the first choice, empty if the provider returned none.
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
    /// Wall-clock duration of the upstream call.
    pub duration: Duration,
    /// Total tokens consumed, when the provider reported usage.
    pub tokens: Option<u64>,
}

/// Chat-completions client wired into the telemetry core.
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    telemetry: Arc<Telemetry>,
    tokens: Counter,
}

impl LlmClient {
    /// Create a client against an OpenAI-compatible endpoint.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self, MetricError> {
        let tokens = telemetry
            .registry()
            .counter("llm_tokens_total", "Total LLM tokens consumed")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            telemetry,
            tokens,
        })
    }

    /// Generate a completion for a single user prompt.
    ///
    /// The fault, if any, propagates unchanged; telemetry around it is the
    /// operation wrapper's job.
    pub async fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: Option<f32>,
    ) -> Result<Completion, Fault> {
        self.telemetry
            .operation("llm.generate")
            .metric_base("llm")
            .label("model", model)
            .run_counting(
                &self.tokens,
                |completion: &Completion| completion.tokens,
                move || async move { self.chat(prompt, model, temperature).await },
            )
            .await
    }

    async fn chat(
        &self,
        prompt: &str,
        model: &str,
        temperature: Option<f32>,
    ) -> Result<Completion, Fault> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature,
        };

        let started = Instant::now();
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Fault::upstream(format!(
                "chat completions returned {status}: {body}"
            )));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Fault::upstream(format!("malformed completion response: {e}")))?;
        Ok(completion_from(parsed, model, started.elapsed()))
    }
}

fn completion_from(response: ChatResponse, requested_model: &str, duration: Duration) -> Completion {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    let tokens = response.usage.and_then(|usage| usage.total_tokens);
    Completion {
        text,
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        duration,
        tokens,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Token usage. Providers may omit any of these.
#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: Option<u64>,
}
