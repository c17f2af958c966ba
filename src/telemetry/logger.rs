// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Leveled, structured log records correlated with the active span.
//!
//! Logging never fails from the caller's perspective: a sink error is noted
//! at trace level and swallowed, so a broken telemetry backend can never
//! change the outcome of the operation being logged.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::context;
use super::sink::{LogRecord, TelemetrySink};
use super::span::SpanId;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits structured records to the sink and mirrors them as tracing events.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    sink: Arc<dyn TelemetrySink>,
}

impl StructuredLogger {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    /// Emit a record tagged with the ambient span, if one is active.
    pub fn log(&self, level: LogLevel, message: &str, attributes: Vec<(String, String)>) {
        self.log_in_span(context::active_span(), level, message, attributes);
    }

    /// Emit a record tagged with an explicit span.
    pub fn log_in_span(
        &self,
        span: Option<SpanId>,
        level: LogLevel,
        message: &str,
        attributes: Vec<(String, String)>,
    ) {
        let attributes: BTreeMap<String, String> = attributes.into_iter().collect();
        self.mirror(level, message, span, &attributes);
        let record = LogRecord {
            level,
            message: message.to_string(),
            attributes,
            span,
            at: Utc::now(),
        };
        if let Err(err) = self.sink.log_emitted(record) {
            tracing::trace!(error = %err, "log record not delivered");
        }
    }

    pub fn debug(&self, message: &str, attributes: Vec<(String, String)>) {
        self.log(LogLevel::Debug, message, attributes);
    }

    pub fn info(&self, message: &str, attributes: Vec<(String, String)>) {
        self.log(LogLevel::Info, message, attributes);
    }

    pub fn warning(&self, message: &str, attributes: Vec<(String, String)>) {
        self.log(LogLevel::Warning, message, attributes);
    }

    pub fn error(&self, message: &str, attributes: Vec<(String, String)>) {
        self.log(LogLevel::Error, message, attributes);
    }

    // tracing's event macros want a const level, hence the match.
    fn mirror(
        &self,
        level: LogLevel,
        message: &str,
        span: Option<SpanId>,
        attributes: &BTreeMap<String, String>,
    ) {
        let span = span.map(|s| s.short()).unwrap_or_default();
        let attrs = render(attributes);
        match level {
            LogLevel::Debug => {
                tracing::debug!(target: "beacon", span = %span, attrs = %attrs, "{message}")
            }
            LogLevel::Info => {
                tracing::info!(target: "beacon", span = %span, attrs = %attrs, "{message}")
            }
            LogLevel::Warning => {
                tracing::warn!(target: "beacon", span = %span, attrs = %attrs, "{message}")
            }
            LogLevel::Error => {
                tracing::error!(target: "beacon", span = %span, attrs = %attrs, "{message}")
            }
        }
    }
}

fn render(attributes: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (k, v)) in attributes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::CaptureSink;

    #[test]
    fn test_log_reaches_sink_with_attributes() {
        let sink = Arc::new(CaptureSink::new());
        let logger = StructuredLogger::new(sink.clone());
        logger.info(
            "operation started",
            vec![("operation".to_string(), "process_task".to_string())],
        );

        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].message, "operation started");
        assert_eq!(
            logs[0].attributes.get("operation").map(String::as_str),
            Some("process_task")
        );
        assert!(logs[0].span.is_none());
    }

    #[test]
    fn test_log_tags_explicit_span() {
        let sink = Arc::new(CaptureSink::new());
        let logger = StructuredLogger::new(sink.clone());
        let id = SpanId::new();
        logger.log_in_span(Some(id), LogLevel::Error, "operation failed", Vec::new());

        let logs = sink.logs();
        assert_eq!(logs[0].span, Some(id));
        assert_eq!(logs[0].level, LogLevel::Error);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        #[derive(Debug)]
        struct FailingSink;
        impl TelemetrySink for FailingSink {
            fn span_completed(
                &self,
                _: crate::telemetry::sink::SpanRecord,
            ) -> Result<(), crate::telemetry::sink::SinkError> {
                Err(crate::telemetry::sink::SinkError::Unavailable("down".into()))
            }
            fn metric_emitted(
                &self,
                _: crate::telemetry::sink::MetricSample,
            ) -> Result<(), crate::telemetry::sink::SinkError> {
                Err(crate::telemetry::sink::SinkError::Unavailable("down".into()))
            }
            fn log_emitted(
                &self,
                _: LogRecord,
            ) -> Result<(), crate::telemetry::sink::SinkError> {
                Err(crate::telemetry::sink::SinkError::Unavailable("down".into()))
            }
        }

        let logger = StructuredLogger::new(Arc::new(FailingSink));
        // Must not panic or propagate.
        logger.error("operation failed", Vec::new());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }
}
