// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The LLM-proxy demo service: a `/generate` endpoint over the chat client.
//!
//! The handler runs under its own `generate_text` operation; the client's
//! `llm.generate` operation nests beneath it, so one request shows up as a
//! two-span trace.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Fault;
use crate::llm::LlmClient;
use crate::telemetry::Telemetry;

use super::{health, ApiError};

/// Request payload for text generation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Response payload for text generation.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

#[derive(Clone)]
struct GenerateState {
    telemetry: Arc<Telemetry>,
    client: Arc<LlmClient>,
    default_model: String,
}

/// Build the llm-api router.
pub fn router(
    telemetry: Arc<Telemetry>,
    client: Arc<LlmClient>,
    default_model: impl Into<String>,
) -> Router {
    let state = GenerateState {
        telemetry,
        client,
        default_model: default_model.into(),
    };
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate_text))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Generate text using the configured LLM endpoint.
async fn generate_text(
    State(state): State<GenerateState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.default_model.clone());
    let client = state.client.clone();
    let prompt = request.prompt.clone();
    let temperature = request.temperature;
    let work_model = model.clone();

    let completion = state
        .telemetry
        .operation("generate_text")
        .run(move || async move {
            if prompt.trim().is_empty() {
                return Err(Fault::validation("prompt must not be empty"));
            }
            client.generate(&prompt, &work_model, temperature).await
        })
        .await?;

    Ok(Json(GenerateResponse {
        text: completion.text,
        model: completion.model,
        duration: completion.duration.as_secs_f64(),
        tokens: completion.tokens,
    }))
}
