// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fault-to-category mapping.
//!
//! Classification labels telemetry only; it never changes control flow and
//! never fails. Anything outside the crate's fault taxonomy reports as
//! `unknown`.

use crate::error::{ErrorCategory, Fault};

/// Map a raised fault to its coarse reporting category.
///
/// Walks the source chain so wrapped faults still classify; an
/// unclassifiable fault maps to [`ErrorCategory::Unknown`] rather than
/// raising from within the classifier.
pub fn classify(fault: &(dyn std::error::Error + 'static)) -> ErrorCategory {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(fault);
    while let Some(err) = current {
        if let Some(fault) = err.downcast_ref::<Fault>() {
            return fault.category();
        }
        current = err.source();
    }
    ErrorCategory::Unknown
}
