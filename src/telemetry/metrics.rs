// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed metric instruments and the process-wide registry.
//!
//! Instruments are registered once, keyed by name, and live for the process.
//! Samples are ephemeral: built, validated, and handed to the sink in one
//! step. Label sets must stay small and bounded; the registry does not
//! enforce that structurally, so call sites are responsible.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;

use super::sink::{MetricSample, TelemetrySink};

/// Errors raised by instrument registration and emission.
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("no instrument registered under `{0}`")]
    NotFound(String),

    #[error("instrument `{name}` already registered as {existing}, requested {requested}")]
    KindMismatch {
        name: String,
        existing: InstrumentKind,
        requested: InstrumentKind,
    },

    #[error("invalid sample for `{name}`: {reason}")]
    InvalidSample { name: String, reason: String },
}

/// The two instrument shapes the core supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Counter,
    Histogram,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => f.write_str("counter"),
            Self::Histogram => f.write_str("histogram"),
        }
    }
}

/// A small, bounded set of key/value tags attached to a metric sample.
///
/// Keys are kept sorted so equal label sets compare equal regardless of
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    /// An empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a label, keeping keys sorted.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.0.binary_search_by(|(k, _)| k.as_str().cmp(key.as_str())) {
            Ok(idx) => self.0[idx].1 = value,
            Err(idx) => self.0.insert(idx, (key, value)),
        }
        self
    }

    /// Look up a label value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.0[idx].1.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the label pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}}")
    }
}

/// A registered metric instrument.
///
/// The name/kind binding is immutable for the life of the process; emission
/// validates the sample and forwards it to the sink synchronously.
#[derive(Debug)]
pub struct Instrument {
    name: String,
    kind: InstrumentKind,
    description: String,
    unit: Option<String>,
    sink: Arc<dyn TelemetrySink>,
}

impl Instrument {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Add a non-negative increment to a counter instrument.
    pub fn counter_add(&self, value: f64, labels: &Labels) -> Result<(), MetricError> {
        if self.kind != InstrumentKind::Counter {
            return Err(MetricError::KindMismatch {
                name: self.name.clone(),
                existing: self.kind,
                requested: InstrumentKind::Counter,
            });
        }
        self.validate(value)?;
        self.emit(value, labels);
        Ok(())
    }

    /// Record an observed magnitude on a histogram instrument.
    pub fn histogram_record(&self, value: f64, labels: &Labels) -> Result<(), MetricError> {
        if self.kind != InstrumentKind::Histogram {
            return Err(MetricError::KindMismatch {
                name: self.name.clone(),
                existing: self.kind,
                requested: InstrumentKind::Histogram,
            });
        }
        self.validate(value)?;
        self.emit(value, labels);
        Ok(())
    }

    fn validate(&self, value: f64) -> Result<(), MetricError> {
        if !value.is_finite() {
            return Err(MetricError::InvalidSample {
                name: self.name.clone(),
                reason: format!("value {value} is not finite"),
            });
        }
        if value < 0.0 {
            return Err(MetricError::InvalidSample {
                name: self.name.clone(),
                reason: format!("value {value} is negative"),
            });
        }
        Ok(())
    }

    // A well-formed sample must never be dropped silently: a sink failure is
    // reported on the log path, not back to the caller.
    fn emit(&self, value: f64, labels: &Labels) {
        let sample = MetricSample {
            name: self.name.clone(),
            kind: self.kind,
            value,
            unit: self.unit.clone(),
            labels: labels.clone(),
            at: Utc::now(),
        };
        if let Err(err) = self.sink.metric_emitted(sample) {
            tracing::warn!(instrument = %self.name, error = %err, "metric sample not delivered");
        }
    }
}

/// Typed handle for a counter instrument registered up front.
#[derive(Debug, Clone)]
pub struct Counter(Arc<Instrument>);

impl Counter {
    pub fn add(&self, value: f64, labels: &Labels) -> Result<(), MetricError> {
        self.0.counter_add(value, labels)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }
}

/// Typed handle for a histogram instrument registered up front.
#[derive(Debug, Clone)]
pub struct Histogram(Arc<Instrument>);

impl Histogram {
    pub fn record(&self, value: f64, labels: &Labels) -> Result<(), MetricError> {
        self.0.histogram_record(value, labels)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }
}

/// Holds every instrument registered in this process, keyed by name.
#[derive(Debug)]
pub struct MetricRegistry {
    instruments: RwLock<HashMap<String, Arc<Instrument>>>,
    sink: Arc<dyn TelemetrySink>,
}

impl MetricRegistry {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Register an instrument, or return the existing one.
    ///
    /// Idempotent per name/kind pair. Re-registering a name with a different
    /// kind is a configuration error.
    pub fn register(
        &self,
        name: &str,
        kind: InstrumentKind,
        description: &str,
        unit: Option<&str>,
    ) -> Result<Arc<Instrument>, MetricError> {
        let mut instruments = self.instruments.write().unwrap();
        if let Some(existing) = instruments.get(name) {
            if existing.kind != kind {
                return Err(MetricError::KindMismatch {
                    name: name.to_string(),
                    existing: existing.kind,
                    requested: kind,
                });
            }
            return Ok(existing.clone());
        }
        let instrument = Arc::new(Instrument {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            unit: unit.map(String::from),
            sink: self.sink.clone(),
        });
        instruments.insert(name.to_string(), instrument.clone());
        Ok(instrument)
    }

    /// Look up a registered instrument by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Instrument>, MetricError> {
        self.instruments
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| MetricError::NotFound(name.to_string()))
    }

    /// Register (or fetch) a counter and return a typed handle.
    pub fn counter(&self, name: &str, description: &str) -> Result<Counter, MetricError> {
        self.register(name, InstrumentKind::Counter, description, None)
            .map(Counter)
    }

    /// Register (or fetch) a histogram and return a typed handle.
    pub fn histogram(
        &self,
        name: &str,
        description: &str,
        unit: Option<&str>,
    ) -> Result<Histogram, MetricError> {
        self.register(name, InstrumentKind::Histogram, description, unit)
            .map(Histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::CaptureSink;

    fn registry() -> (MetricRegistry, Arc<CaptureSink>) {
        let capture = Arc::new(CaptureSink::new());
        (MetricRegistry::new(capture.clone()), capture)
    }

    #[test]
    fn test_register_is_idempotent_per_name_kind() {
        let (registry, _) = registry();
        let first = registry
            .register("llm_requests_total", InstrumentKind::Counter, "LLM requests", None)
            .unwrap();
        let second = registry
            .register("llm_requests_total", InstrumentKind::Counter, "ignored", None)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // The first description wins.
        assert_eq!(second.description(), "LLM requests");
    }

    #[test]
    fn test_register_rejects_kind_change() {
        let (registry, _) = registry();
        registry
            .register("llm_requests_total", InstrumentKind::Counter, "LLM requests", None)
            .unwrap();
        let err = registry
            .register("llm_requests_total", InstrumentKind::Histogram, "oops", None)
            .unwrap_err();
        assert!(matches!(err, MetricError::KindMismatch { .. }));
    }

    #[test]
    fn test_lookup_missing() {
        let (registry, _) = registry();
        let err = registry.lookup("nope").unwrap_err();
        assert!(matches!(err, MetricError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn test_counter_rejects_negative_and_non_finite() {
        let (registry, capture) = registry();
        let counter = registry.counter("tasks_total", "Tasks").unwrap();
        assert!(counter.add(-1.0, &Labels::new()).is_err());
        assert!(counter.add(f64::NAN, &Labels::new()).is_err());
        assert!(counter.add(f64::INFINITY, &Labels::new()).is_err());
        assert!(capture.samples().is_empty());
        counter.add(0.0, &Labels::new()).unwrap();
        assert_eq!(capture.samples().len(), 1);
    }

    #[test]
    fn test_histogram_rejects_invalid_input() {
        let (registry, _) = registry();
        let histogram = registry
            .histogram("task_duration_seconds", "Task duration", Some("s"))
            .unwrap();
        assert!(histogram.record(-0.5, &Labels::new()).is_err());
        assert!(histogram.record(f64::NEG_INFINITY, &Labels::new()).is_err());
        histogram.record(0.25, &Labels::new()).unwrap();
    }

    #[test]
    fn test_kind_mismatch_on_emission() {
        let (registry, _) = registry();
        let instrument = registry
            .register("tasks_total", InstrumentKind::Counter, "Tasks", None)
            .unwrap();
        let err = instrument.histogram_record(1.0, &Labels::new()).unwrap_err();
        assert!(matches!(err, MetricError::KindMismatch { .. }));
    }

    #[test]
    fn test_samples_carry_labels_and_unit() {
        let (registry, capture) = registry();
        let histogram = registry
            .histogram("llm_request_duration_seconds", "LLM latency", Some("s"))
            .unwrap();
        let labels = Labels::new().with("model", "gpt-4o-mini");
        histogram.record(0.42, &labels).unwrap();

        let samples = capture.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "llm_request_duration_seconds");
        assert_eq!(samples[0].unit.as_deref(), Some("s"));
        assert_eq!(samples[0].labels.get("model"), Some("gpt-4o-mini"));
        assert!((samples[0].value - 0.42).abs() < f64::EPSILON);
    }

    #[test]
    fn test_labels_sorted_and_replaced() {
        let labels = Labels::new()
            .with("model", "a")
            .with("group", "1")
            .with("model", "b");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("model"), Some("b"));
        let keys: Vec<&str> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["group", "model"]);
        assert_eq!(labels.to_string(), "{group=1, model=b}");
    }
}
