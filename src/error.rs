// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fault taxonomy shared by the instrumentation core and the demo services.
//!
//! Every instrumented operation carries its fault through the telemetry layer
//! unchanged; the taxonomy here is what the error classifier and the API
//! boundaries agree on. Uses `thiserror` for the typed faults and `anyhow`
//! for binary entry points.

use thiserror::Error;

/// A fault raised by a unit of work running under instrumentation.
///
/// The instrumentation core never swallows or recategorizes one of these; it
/// only annotates telemetry around it before re-raising.
#[derive(Error, Debug)]
pub enum Fault {
    /// Caller-supplied input was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A dependency (LLM provider, HTTP target, store) failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A logic or programming error inside the work itself.
    #[error("internal error: {0}")]
    Internal(String),

    /// The execution context cancelled the operation mid-flight.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl Fault {
    /// Create a validation fault.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an upstream fault.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Create an internal fault.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The coarse category this fault reports under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Upstream(_) => ErrorCategory::Upstream,
            Self::Internal(_) => ErrorCategory::Internal,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }
}

impl From<reqwest::Error> for Fault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Upstream(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Upstream(format!("connection failed: {err}"))
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

/// Coarse error category attached to error logs and span attributes.
///
/// Categories label telemetry only; they never change control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Upstream,
    Internal,
    Cancelled,
    Unknown,
}

impl ErrorCategory {
    /// Stable string form used in labels and attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_failure",
            Self::Upstream => "upstream_failure",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_categories() {
        assert_eq!(
            Fault::validation("empty name").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Fault::upstream("503 from provider").category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            Fault::internal("index out of range").category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            Fault::Cancelled("timeout".to_string()).category(),
            ErrorCategory::Cancelled
        );
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ErrorCategory::Validation.as_str(), "validation_failure");
        assert_eq!(ErrorCategory::Upstream.as_str(), "upstream_failure");
        assert_eq!(ErrorCategory::Internal.as_str(), "internal");
        assert_eq!(ErrorCategory::Cancelled.as_str(), "cancelled");
        assert_eq!(ErrorCategory::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::upstream("404 Not Found");
        assert_eq!(fault.to_string(), "upstream failure: 404 Not Found");
    }
}
