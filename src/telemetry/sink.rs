// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The abstract destination for completed telemetry events.
//!
//! The core hands every finished span, metric sample, and log record to a
//! [`TelemetrySink`]. Real deployments would plug in a remote collector;
//! this repository ships two in-process sinks: [`TracingSink`] forwards
//! everything to the `tracing` subscriber, and [`CaptureSink`] keeps events
//! in memory for tests and end-of-run reports. Batching or buffering toward
//! a backend is the sink's concern, not the core's.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::logger::LogLevel;
use super::metrics::{InstrumentKind, Labels};
use super::span::{SpanId, SpanStatus};

/// A sink failure. Swallowed by the log path, warned about by the metric
/// path; never surfaced to the instrumented caller.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// A completed span, emitted exactly once at close.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpanRecord {
    pub id: SpanId,
    pub parent: Option<SpanId>,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, String>,
}

/// One metric emission. Built, validated, and delivered atomically.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSample {
    pub name: String,
    pub kind: InstrumentKind,
    pub value: f64,
    pub unit: Option<String>,
    pub labels: Labels,
    pub at: DateTime<Utc>,
}

/// One structured log record, immutable once emitted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub attributes: BTreeMap<String, String>,
    pub span: Option<SpanId>,
    pub at: DateTime<Utc>,
}

/// Destination for completed telemetry events.
///
/// Implementations must be cheap and non-blocking from the caller's
/// perspective; emission happens inline on the instrumented path.
pub trait TelemetrySink: Send + Sync + std::fmt::Debug {
    fn span_completed(&self, span: SpanRecord) -> Result<(), SinkError>;
    fn metric_emitted(&self, sample: MetricSample) -> Result<(), SinkError>;
    fn log_emitted(&self, record: LogRecord) -> Result<(), SinkError>;
}

/// Forwards every event to the `tracing` subscriber configured at startup.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingSink {
    fn span_completed(&self, span: SpanRecord) -> Result<(), SinkError> {
        tracing::debug!(
            target: "beacon::telemetry",
            span = %span.name,
            id = %span.id,
            parent = %span.parent.map(|p| p.to_string()).unwrap_or_default(),
            status = span.status.as_str(),
            duration_seconds = span.duration_seconds,
            attributes = %render_attributes(&span.attributes),
            "span completed"
        );
        Ok(())
    }

    fn metric_emitted(&self, sample: MetricSample) -> Result<(), SinkError> {
        tracing::debug!(
            target: "beacon::telemetry",
            instrument = %sample.name,
            kind = %sample.kind,
            value = sample.value,
            labels = %sample.labels,
            "metric sample"
        );
        Ok(())
    }

    fn log_emitted(&self, _record: LogRecord) -> Result<(), SinkError> {
        // Log records are already mirrored as tracing events by the logger;
        // emitting them again here would duplicate every line.
        Ok(())
    }
}

/// A single event in the order the sink received it.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Span(SpanRecord),
    Metric(MetricSample),
    Log(LogRecord),
}

/// In-memory sink preserving the full emission timeline.
///
/// Used by the test suite to assert on exact event counts and ordering, and
/// by the worker binary for its end-of-run report.
#[derive(Debug, Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far, in emission order.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Completed spans, in emission order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Span(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Metric samples, in emission order.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Metric(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Log records, in emission order.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Log(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Samples for one instrument.
    pub fn samples_named(&self, name: &str) -> Vec<MetricSample> {
        self.samples()
            .into_iter()
            .filter(|s| s.name == name)
            .collect()
    }

    /// Format an aggregate report of everything captured.
    pub fn format_report(&self) -> String {
        let mut counters: BTreeMap<String, f64> = BTreeMap::new();
        let mut histograms: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut spans_ok = 0usize;
        let mut spans_error = 0usize;

        for event in self.events() {
            match event {
                SinkEvent::Metric(sample) => {
                    let key = if sample.labels.is_empty() {
                        sample.name.clone()
                    } else {
                        format!("{} {}", sample.name, sample.labels)
                    };
                    match sample.kind {
                        InstrumentKind::Counter => {
                            *counters.entry(key).or_insert(0.0) += sample.value;
                        }
                        InstrumentKind::Histogram => {
                            histograms.entry(key).or_default().push(sample.value);
                        }
                    }
                }
                SinkEvent::Span(span) => match span.status {
                    SpanStatus::Ok => spans_ok += 1,
                    SpanStatus::Error => spans_error += 1,
                },
                SinkEvent::Log(_) => {}
            }
        }

        let mut report = String::new();
        report.push_str("=== Telemetry Report ===\n\n");
        let _ = writeln!(report, "Spans: {} ok, {} error\n", spans_ok, spans_error);

        if !counters.is_empty() {
            report.push_str("Counters:\n");
            for (name, total) in &counters {
                let _ = writeln!(report, "  {}: {}", name, total);
            }
            report.push('\n');
        }

        if !histograms.is_empty() {
            report.push_str("Histograms:\n");
            for (name, values) in &histograms {
                let count = values.len();
                let sum: f64 = values.iter().sum();
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = values.iter().cloned().fold(0.0f64, f64::max);
                let _ = writeln!(
                    report,
                    "  {}: {} samples, avg {:.3}, min {:.3}, max {:.3}",
                    name,
                    count,
                    sum / count as f64,
                    min,
                    max
                );
            }
        }

        report
    }
}

impl TelemetrySink for CaptureSink {
    fn span_completed(&self, span: SpanRecord) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(SinkEvent::Span(span));
        Ok(())
    }

    fn metric_emitted(&self, sample: MetricSample) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(SinkEvent::Metric(sample));
        Ok(())
    }

    fn log_emitted(&self, record: LogRecord) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(SinkEvent::Log(record));
        Ok(())
    }
}

fn render_attributes(attributes: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (k, v)) in attributes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{k}={v}");
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_preserves_order() {
        let sink = CaptureSink::new();
        sink.log_emitted(LogRecord {
            level: LogLevel::Info,
            message: "operation started".to_string(),
            attributes: BTreeMap::new(),
            span: None,
            at: Utc::now(),
        })
        .unwrap();
        sink.metric_emitted(MetricSample {
            name: "tasks_total".to_string(),
            kind: InstrumentKind::Counter,
            value: 1.0,
            unit: None,
            labels: Labels::new(),
            at: Utc::now(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SinkEvent::Log(_)));
        assert!(matches!(events[1], SinkEvent::Metric(_)));
    }

    #[test]
    fn test_report_aggregates_counters() {
        let sink = CaptureSink::new();
        for _ in 0..3 {
            sink.metric_emitted(MetricSample {
                name: "tasks_total".to_string(),
                kind: InstrumentKind::Counter,
                value: 1.0,
                unit: None,
                labels: Labels::new(),
                at: Utc::now(),
            })
            .unwrap();
        }
        let report = sink.format_report();
        assert!(report.contains("tasks_total: 3"));
    }
}
