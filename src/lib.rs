// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Beacon - instrumented demo services.
//!
//! Three small services (a CRUD API, an LLM-proxy API, and a batch worker)
//! sharing one non-trivial piece: a uniform instrumentation core that wraps
//! any operation with a tracing span, structured logs, and typed metrics,
//! and classifies faults consistently on the way back out.
//!
//! # Architecture
//!
//! - [`telemetry`] - the instrumentation core: operations, spans, metrics,
//!   structured logs, sinks, and fault classification
//! - [`error`] - the fault taxonomy carried through instrumented work
//! - [`llm`] - instrumented client for OpenAI-compatible chat completions
//! - [`api`] - axum routers for the two HTTP demo services
//! - [`workloads`] - simulated batch work for the worker binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beacon::telemetry::Telemetry;
//!
//! let telemetry = Arc::new(Telemetry::new());
//! let result = telemetry
//!     .operation("process_task")
//!     .label("task_type", "simulated")
//!     .run(|| async { do_work().await })
//!     .await?;
//! ```

pub mod api;
pub mod error;
pub mod llm;
pub mod telemetry;
pub mod workloads;

// Re-export commonly used types at crate root
pub use error::{ErrorCategory, Fault, Result};
pub use llm::{Completion, LlmClient, DEFAULT_MODEL, OPENAI_BASE_URL};
pub use telemetry::{
    CaptureSink, Counter, Histogram, Labels, LogLevel, MetricRegistry, Operation, Span, SpanId,
    SpanStatus, StructuredLogger, Telemetry, TelemetrySink, TracingSink,
};
pub use workloads::Workloads;

/// Beacon version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _telemetry = Telemetry::new();
        let _labels = Labels::new().with("model", DEFAULT_MODEL);
    }
}
