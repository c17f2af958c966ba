// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP surfaces for the demo services.
//!
//! The routers here are call sites of the instrumentation core, not part of
//! it: each handler wraps its work in an operation and maps the propagated
//! fault to a status code at the boundary.

pub mod generate;
pub mod users;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::Fault;

/// Boundary wrapper turning a propagated [`Fault`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Fault);

impl From<Fault> for ApiError {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Fault::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Fault::Upstream(_) => StatusCode::BAD_GATEWAY,
            Fault::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            Fault::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            category: self.0.category().as_str().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Error payload returned to clients.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: String,
}

/// Health check payload.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint shared by both services.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
