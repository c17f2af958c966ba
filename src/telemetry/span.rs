// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Scoped, timed units of traced work.
//!
//! A [`Span`] starts timing the moment it is opened and is closed exactly
//! once, on every exit path. Duration comes from a monotonic clock; the
//! wall-clock open/close times only annotate the emitted record.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorCategory;

use super::context;
use super::sink::{SpanRecord, TelemetrySink};

/// A unique identifier tying a span to its children and log records.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(Uuid);

impl SpanId {
    /// Generate a new random span id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get a short representation (first 8 characters).
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self.short())
    }
}

impl serde::Serialize for SpanId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for SpanId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Uuid::deserialize(deserializer).map(Self)
    }
}

/// Terminal status of a closed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Misuse of the span lifecycle.
#[derive(Error, Debug)]
pub enum SpanError {
    #[error("span `{0}` is already closed")]
    AlreadyClosed(String),
}

/// An open span. Attributes are mutable until close; close emits the
/// completed record to the sink and is valid exactly once.
#[derive(Debug)]
pub struct Span {
    id: SpanId,
    name: String,
    parent: Option<SpanId>,
    started: Instant,
    opened_at: chrono::DateTime<Utc>,
    attributes: BTreeMap<String, String>,
    faulted: bool,
    closed: bool,
    sink: Arc<dyn TelemetrySink>,
}

impl Span {
    /// Open a span nested under the ambient span, if one is active.
    pub(crate) fn open(name: impl Into<String>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::open_child_of(name, context::active_span(), sink)
    }

    /// Open a span with an explicit parent (or none, for a root span).
    pub(crate) fn open_child_of(
        name: impl Into<String>,
        parent: Option<SpanId>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            id: SpanId::new(),
            name: name.into(),
            parent,
            started: Instant::now(),
            opened_at: Utc::now(),
            attributes: BTreeMap::new(),
            faulted: false,
            closed: false,
            sink,
        }
    }

    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wall-clock-independent elapsed time since open.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Attach or overwrite an attribute. Valid any time before close.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SpanError> {
        if self.closed {
            return Err(SpanError::AlreadyClosed(self.name.clone()));
        }
        self.attributes.insert(key.into(), value.into());
        Ok(())
    }

    /// Mark the span as faulted and attach the fault's category and message.
    ///
    /// The caller must still close the span afterwards.
    pub fn record_exception(
        &mut self,
        category: ErrorCategory,
        message: &str,
    ) -> Result<(), SpanError> {
        if self.closed {
            return Err(SpanError::AlreadyClosed(self.name.clone()));
        }
        self.faulted = true;
        self.attributes
            .insert("error.category".to_string(), category.as_str().to_string());
        self.attributes
            .insert("error.message".to_string(), message.to_string());
        Ok(())
    }

    /// Close the span, emitting the completed record to the sink.
    ///
    /// A recorded exception forces the terminal status to error regardless of
    /// the status passed here. Closing twice is a programming error and is
    /// signalled, not ignored.
    pub fn close(&mut self, status: SpanStatus) -> Result<Duration, SpanError> {
        if self.closed {
            return Err(SpanError::AlreadyClosed(self.name.clone()));
        }
        self.closed = true;
        let status = if self.faulted { SpanStatus::Error } else { status };
        if status == SpanStatus::Error && !self.attributes.contains_key("error.category") {
            // An error span always describes its fault.
            self.attributes.insert(
                "error.category".to_string(),
                ErrorCategory::Unknown.as_str().to_string(),
            );
        }
        let elapsed = self.started.elapsed();
        let record = SpanRecord {
            id: self.id,
            parent: self.parent,
            name: self.name.clone(),
            started_at: self.opened_at,
            ended_at: Utc::now(),
            duration_seconds: elapsed.as_secs_f64(),
            status,
            attributes: std::mem::take(&mut self.attributes),
        };
        if let Err(err) = self.sink.span_completed(record) {
            tracing::warn!(span = %self.name, error = %err, "span record not delivered");
        }
        Ok(elapsed)
    }
}

impl Drop for Span {
    // Safety net for unwind paths: a span abandoned while open is still
    // closed exactly once, marked as cancelled (or internal if panicking).
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let category = if std::thread::panicking() {
            ErrorCategory::Internal
        } else {
            ErrorCategory::Cancelled
        };
        let _ = self.record_exception(category, "span dropped while open");
        let _ = self.close(SpanStatus::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::CaptureSink;

    fn capture() -> Arc<CaptureSink> {
        Arc::new(CaptureSink::new())
    }

    #[test]
    fn test_span_id_display_and_short() {
        let id = SpanId::new();
        assert_eq!(id.short().len(), 8);
        assert!(format!("{:?}", id).starts_with("SpanId("));
    }

    #[test]
    fn test_close_emits_record_once() {
        let sink = capture();
        let mut span = Span::open_child_of("llm.generate", None, sink.clone());
        span.set_attribute("model", "gpt-4o-mini").unwrap();
        let elapsed = span.close(SpanStatus::Ok).unwrap();
        assert!(elapsed >= Duration::ZERO);

        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "llm.generate");
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[0].attributes.get("model").map(String::as_str), Some("gpt-4o-mini"));
        assert!(spans[0].ended_at >= spans[0].started_at);
    }

    #[test]
    fn test_double_close_rejected() {
        let sink = capture();
        let mut span = Span::open_child_of("fetch_data", None, sink.clone());
        span.close(SpanStatus::Ok).unwrap();
        let err = span.close(SpanStatus::Ok).unwrap_err();
        assert!(matches!(err, SpanError::AlreadyClosed(_)));
        // No double emission either.
        assert_eq!(sink.spans().len(), 1);
    }

    #[test]
    fn test_set_attribute_after_close_rejected() {
        let sink = capture();
        let mut span = Span::open_child_of("process_task", None, sink);
        span.close(SpanStatus::Ok).unwrap();
        assert!(span.set_attribute("late", "value").is_err());
    }

    #[test]
    fn test_record_exception_forces_error_status() {
        let sink = capture();
        let mut span = Span::open_child_of("fetch_data", None, sink.clone());
        span.record_exception(ErrorCategory::Upstream, "404 Not Found")
            .unwrap();
        span.close(SpanStatus::Ok).unwrap();

        let spans = sink.spans();
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(
            spans[0].attributes.get("error.category").map(String::as_str),
            Some("upstream_failure")
        );
        assert_eq!(
            spans[0].attributes.get("error.message").map(String::as_str),
            Some("404 Not Found")
        );
    }

    #[test]
    fn test_error_close_always_describes_fault() {
        let sink = capture();
        let mut span = Span::open_child_of("process_task", None, sink.clone());
        span.close(SpanStatus::Error).unwrap();
        let spans = sink.spans();
        assert_eq!(
            spans[0].attributes.get("error.category").map(String::as_str),
            Some("unknown")
        );
    }

    #[test]
    fn test_drop_closes_abandoned_span_as_cancelled() {
        let sink = capture();
        {
            let _span = Span::open_child_of("slow_operation", None, sink.clone());
        }
        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(
            spans[0].attributes.get("error.category").map(String::as_str),
            Some("cancelled")
        );
    }

    #[test]
    fn test_parent_recorded() {
        let sink = capture();
        let mut outer = Span::open_child_of("outer", None, sink.clone());
        let mut inner = Span::open_child_of("inner", Some(outer.id()), sink.clone());
        inner.close(SpanStatus::Ok).unwrap();
        outer.close(SpanStatus::Ok).unwrap();

        let spans = sink.spans();
        assert_eq!(spans[0].name, "inner");
        assert_eq!(spans[0].parent, Some(spans[1].id));
        assert_eq!(spans[1].parent, None);
    }
}
