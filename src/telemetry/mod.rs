// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and metrics infrastructure.
//!
//! This module is the instrumentation core shared by every demo service:
//!
//! - **Operations**: wrap any unit of work (sync or async) with a span,
//!   begin/end/error logs, and per-operation metrics
//! - **Metrics**: typed counter and histogram instruments with bounded
//!   label sets, held in a process-wide registry
//! - **Spans**: timed, named units of work nested under the ambient span
//! - **Structured logs**: leveled records correlated with the active span
//! - **Sinks**: an abstract destination for completed telemetry events
//!
//! # Usage
//!
//! Initialize the tracing subscriber once at startup, build one
//! [`Telemetry`] handle, and wrap each operation at its call site:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beacon::telemetry::{init_logging, LoggingConfig, Telemetry};
//!
//! let _guard = init_logging(&LoggingConfig::default())?;
//! let telemetry = Arc::new(Telemetry::new());
//!
//! let bytes = telemetry
//!     .operation("fetch_data")
//!     .run(|| async { fetch(url).await })
//!     .await?;
//! ```
//!
//! # Integration guidelines
//!
//! 1. **Pick stable operation names** - they key the derived instruments
//! 2. **Keep label vocabularies small** - cardinality is the caller's job
//! 3. **Let faults propagate** - the wrapper annotates and re-raises;
//!    recovery belongs at the boundary

mod classify;
pub mod context;
mod init;
mod logger;
pub mod metrics;
mod operation;
pub mod sink;
mod span;

use std::sync::Arc;

pub use classify::classify;
pub use init::{init_logging, LogFormat, LoggingConfig, LoggingGuard};
pub use logger::{LogLevel, StructuredLogger};
pub use metrics::{Counter, Histogram, Instrument, InstrumentKind, Labels, MetricError, MetricRegistry};
pub use operation::Operation;
pub use sink::{CaptureSink, LogRecord, MetricSample, SinkError, SinkEvent, SpanRecord, TelemetrySink, TracingSink};
pub use span::{Span, SpanError, SpanId, SpanStatus};

/// Process-wide telemetry handle: one sink, one metric registry, one
/// structured logger. Built once in `main` and shared via `Arc`.
#[derive(Debug)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    registry: MetricRegistry,
    logger: StructuredLogger,
}

impl Telemetry {
    /// Telemetry forwarding to the `tracing` subscriber.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink::new()))
    }

    /// Telemetry with a custom sink (capture, remote collector, ...).
    pub fn with_sink(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            registry: MetricRegistry::new(sink.clone()),
            logger: StructuredLogger::new(sink.clone()),
            sink,
        }
    }

    pub fn sink(&self) -> Arc<dyn TelemetrySink> {
        self.sink.clone()
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Start building an instrumented operation.
    pub fn operation(&self, name: impl Into<String>) -> Operation<'_> {
        Operation::new(self, name.into())
    }

    /// Open a manual span nested under the ambient span.
    ///
    /// Most call sites want [`operation`](Self::operation) instead; manual
    /// spans are for work that brackets something other than one closure.
    pub fn span(&self, name: impl Into<String>) -> Span {
        Span::open(name, self.sink.clone())
    }

    /// Open a manual span with an explicit parent.
    pub fn span_with_parent(&self, name: impl Into<String>, parent: Option<SpanId>) -> Span {
        Span::open_child_of(name, parent, self.sink.clone())
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
