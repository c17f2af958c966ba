// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The wrapper contract: run any unit of work under a span, structured
//! logs, and per-operation metrics.
//!
//! One builder covers synchronous and suspendable work. The span stays open
//! across suspension points, so recorded duration matches the latency the
//! caller observed, including suspended time. Metric emission happens while
//! the span is still open; the span closes last.
//!
//! Counting semantics: the requests counter counts successful completions;
//! a failure increments the dedicated failures counter instead. A fault is
//! always re-raised unmodified.

use std::future::Future;

use crate::error::ErrorCategory;

use super::classify::classify;
use super::context;
use super::logger::{LogLevel, StructuredLogger};
use super::metrics::{Counter, Histogram, Labels, MetricError};
use super::span::{Span, SpanStatus};
use super::Telemetry;

/// Builder for a single instrumented invocation.
///
/// ```rust,ignore
/// let reply = telemetry
///     .operation("llm.generate")
///     .label("model", model)
///     .run(|| async { client.chat(prompt).await })
///     .await?;
/// ```
pub struct Operation<'t> {
    telemetry: &'t Telemetry,
    name: String,
    labels: Labels,
    metric_base: Option<String>,
}

/// A secondary quantity extracted from a successful result, e.g. tokens
/// consumed by an LLM response. Absence is not an error.
struct Quantity<'c, T> {
    counter: &'c Counter,
    measure: Box<dyn FnOnce(&T) -> Option<u64> + Send>,
}

struct OpInstruments {
    requests: Option<Counter>,
    duration: Option<Histogram>,
    failed: Option<Counter>,
}

impl<'t> Operation<'t> {
    pub(crate) fn new(telemetry: &'t Telemetry, name: String) -> Self {
        Self {
            telemetry,
            name,
            labels: Labels::new(),
            metric_base: None,
        }
    }

    /// Attach a label. Keys must come from a small fixed vocabulary; the
    /// builder does not enforce cardinality.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels = self.labels.with(key, value);
        self
    }

    /// Override the base name the per-operation instruments derive from.
    /// Defaults to the sanitized operation name.
    pub fn metric_base(mut self, base: impl Into<String>) -> Self {
        self.metric_base = Some(base.into());
        self
    }

    /// Run a suspendable unit of work under instrumentation.
    pub async fn run<F, Fut, T, E>(self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.execute(None, work).await
    }

    /// Like [`run`](Self::run), additionally recording a secondary quantity
    /// counter when the result exposes one.
    pub async fn run_counting<F, Fut, T, E, M>(
        self,
        counter: &Counter,
        measure: M,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        M: FnOnce(&T) -> Option<u64> + Send + 'static,
    {
        self.execute(
            Some(Quantity {
                counter,
                measure: Box::new(measure),
            }),
            work,
        )
        .await
    }

    /// Run a synchronous unit of work under instrumentation.
    pub fn run_blocking<F, T, E>(self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + 'static,
    {
        let instruments = self.instruments();
        let (span, logger) = self.open();
        let span_id = span.id();
        let guard = OperationGuard {
            span: Some(span),
            failed: instruments.failed.clone(),
            labels: self.labels.clone(),
            logger: logger.clone(),
            name: self.name.clone(),
        };

        let result = context::sync_scope(span_id, work);

        match result {
            Ok(value) => {
                let span = guard.into_span();
                self.on_success(span, &logger, &instruments, None);
                Ok(value)
            }
            Err(fault) => {
                let span = guard.into_span();
                self.on_failure(span, &logger, &instruments, &fault);
                Err(fault)
            }
        }
    }

    async fn execute<F, Fut, T, E>(
        self,
        quantity: Option<Quantity<'_, T>>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let instruments = self.instruments();
        let (span, logger) = self.open();
        let span_id = span.id();
        let guard = OperationGuard {
            span: Some(span),
            failed: instruments.failed.clone(),
            labels: self.labels.clone(),
            logger: logger.clone(),
            name: self.name.clone(),
        };

        let result = context::scope(span_id, work()).await;

        match result {
            Ok(value) => {
                let span = guard.into_span();
                let measured = quantity.and_then(|q| {
                    let observed = (q.measure)(&value)?;
                    record_counter(q.counter, observed as f64, &self.labels);
                    Some((q.counter.name().to_string(), observed))
                });
                self.on_success(span, &logger, &instruments, measured);
                Ok(value)
            }
            Err(fault) => {
                let span = guard.into_span();
                self.on_failure(span, &logger, &instruments, &fault);
                Err(fault)
            }
        }
    }

    /// Open the span (nested under the ambient one) and emit the start log.
    fn open(&self) -> (Span, StructuredLogger) {
        let mut span = Span::open(self.name.as_str(), self.telemetry.sink());
        for (key, value) in self.labels.iter() {
            let _ = span.set_attribute(key, value);
        }
        let logger = self.telemetry.logger().clone();
        logger.log_in_span(
            Some(span.id()),
            LogLevel::Info,
            "operation started",
            vec![
                ("operation".to_string(), self.name.clone()),
                ("labels".to_string(), self.labels.to_string()),
            ],
        );
        (span, logger)
    }

    fn on_success(
        &self,
        mut span: Span,
        logger: &StructuredLogger,
        instruments: &OpInstruments,
        measured: Option<(String, u64)>,
    ) {
        let elapsed = span.elapsed().as_secs_f64();
        if let Some(requests) = &instruments.requests {
            record_counter(requests, 1.0, &self.labels);
        }
        if let Some(duration) = &instruments.duration {
            if let Err(err) = duration.record(elapsed, &self.labels) {
                tracing::debug!(error = %err, "duration sample not recorded");
            }
        }
        let mut attrs = vec![
            ("operation".to_string(), self.name.clone()),
            ("duration_seconds".to_string(), format!("{elapsed:.6}")),
        ];
        if let Some((name, observed)) = measured {
            attrs.push((name, observed.to_string()));
        }
        logger.log_in_span(Some(span.id()), LogLevel::Info, "operation succeeded", attrs);
        let _ = span.set_attribute("duration_seconds", format!("{elapsed:.6}"));
        let _ = span.close(SpanStatus::Ok);
    }

    fn on_failure<E>(
        &self,
        mut span: Span,
        logger: &StructuredLogger,
        instruments: &OpInstruments,
        fault: &E,
    ) where
        E: std::error::Error + 'static,
    {
        let category = classify(fault);
        if let Some(failed) = &instruments.failed {
            record_counter(failed, 1.0, &self.labels);
        }
        logger.log_in_span(
            Some(span.id()),
            LogLevel::Error,
            "operation failed",
            vec![
                ("operation".to_string(), self.name.clone()),
                ("error.category".to_string(), category.as_str().to_string()),
                ("error.message".to_string(), fault.to_string()),
            ],
        );
        let _ = span.record_exception(category, &fault.to_string());
        let _ = span.close(SpanStatus::Error);
    }

    fn instruments(&self) -> OpInstruments {
        let base = self
            .metric_base
            .clone()
            .unwrap_or_else(|| sanitize_metric_base(&self.name));
        let registry = self.telemetry.registry();
        OpInstruments {
            requests: keep(registry.counter(
                &format!("{base}_requests_total"),
                &format!("Number of successful `{}` operations", self.name),
            )),
            duration: keep(registry.histogram(
                &format!("{base}_request_duration_seconds"),
                &format!("Duration of `{}` operations", self.name),
                Some("s"),
            )),
            failed: keep(registry.counter(
                &format!("{base}_requests_failed_total"),
                &format!("Number of failed `{}` operations", self.name),
            )),
        }
    }
}

/// Closes the books on an operation whose future was dropped mid-flight.
/// Cancellation counts as a fault: one failure increment, one error log,
/// one span closed with the `cancelled` category.
struct OperationGuard {
    span: Option<Span>,
    failed: Option<Counter>,
    labels: Labels,
    logger: StructuredLogger,
    name: String,
}

impl OperationGuard {
    fn into_span(mut self) -> Span {
        self.span.take().expect("operation guard already completed")
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let Some(mut span) = self.span.take() else {
            return;
        };
        let (category, message) = if std::thread::panicking() {
            (ErrorCategory::Internal, "operation panicked")
        } else {
            (ErrorCategory::Cancelled, "execution context dropped the operation")
        };
        if let Some(failed) = &self.failed {
            record_counter(failed, 1.0, &self.labels);
        }
        self.logger.log_in_span(
            Some(span.id()),
            LogLevel::Error,
            "operation failed",
            vec![
                ("operation".to_string(), self.name.clone()),
                ("error.category".to_string(), category.as_str().to_string()),
                ("error.message".to_string(), message.to_string()),
            ],
        );
        let _ = span.record_exception(category, message);
        let _ = span.close(SpanStatus::Error);
    }
}

// A misconfigured instrument (name collision with a different kind) loses
// its metrics but never fails the operation; the collision is reported once
// per invocation on the log path.
fn keep<I>(result: Result<I, MetricError>) -> Option<I> {
    match result {
        Ok(instrument) => Some(instrument),
        Err(err) => {
            tracing::error!(error = %err, "operation instrument unavailable");
            None
        }
    }
}

fn record_counter(counter: &Counter, value: f64, labels: &Labels) {
    if let Err(err) = counter.add(value, labels) {
        tracing::debug!(error = %err, "operation counter not updated");
    }
}

fn sanitize_metric_base(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
