// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ambient span discovery.
//!
//! The active span id rides a tokio task-local, so newly opened spans find
//! their parent without the caller passing it explicitly. The value is
//! scoped to one task (or one synchronous call frame), never shared mutable
//! state across threads.

use std::future::Future;

use super::span::SpanId;

tokio::task_local! {
    static ACTIVE_SPAN: SpanId;
}

/// The span the current execution context is running under, if any.
pub fn active_span() -> Option<SpanId> {
    ACTIVE_SPAN.try_with(|id| *id).ok()
}

/// Run a future with `id` as the ambient span.
///
/// The scope holds across every suspension point of `fut`.
pub async fn scope<F: Future>(id: SpanId, fut: F) -> F::Output {
    ACTIVE_SPAN.scope(id, fut).await
}

/// Run a synchronous closure with `id` as the ambient span.
pub fn sync_scope<T>(id: SpanId, f: impl FnOnce() -> T) -> T {
    ACTIVE_SPAN.sync_scope(id, f)
}
