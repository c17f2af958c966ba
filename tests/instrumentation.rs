// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end checks of the instrumentation contract through the public API.

use std::sync::Arc;
use std::time::Duration;

use beacon::telemetry::{CaptureSink, SpanStatus, Telemetry};
use beacon::Fault;

fn telemetry() -> (Arc<Telemetry>, Arc<CaptureSink>) {
    let capture = Arc::new(CaptureSink::new());
    (Arc::new(Telemetry::with_sink(capture.clone())), capture)
}

#[tokio::test]
async fn successful_invocation_emits_each_signal_exactly_once() {
    let (telemetry, capture) = telemetry();

    let value = telemetry
        .operation("process_task")
        .run(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Fault>(0.1f64)
        })
        .await
        .unwrap();
    assert!((value - 0.1).abs() < f64::EPSILON);

    let requests = capture.samples_named("process_task_requests_total");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].labels.is_empty());

    let durations = capture.samples_named("process_task_request_duration_seconds");
    assert_eq!(durations.len(), 1);
    // Duration tracks the injected delay within scheduler jitter.
    assert!(durations[0].value >= 0.1);
    assert!(durations[0].value < 0.6);

    assert!(capture
        .samples_named("process_task_requests_failed_total")
        .is_empty());

    let spans = capture.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, SpanStatus::Ok);
    assert!(spans[0].duration_seconds >= 0.1);

    let successes: Vec<_> = capture
        .logs()
        .into_iter()
        .filter(|l| l.message == "operation succeeded")
        .collect();
    assert_eq!(successes.len(), 1);
}

#[tokio::test]
async fn failing_invocation_counts_failure_and_reraises_unchanged() {
    let (telemetry, capture) = telemetry();

    let err = telemetry
        .operation("fetch_data")
        .run(|| async { Err::<String, _>(Fault::upstream("404 Not Found")) })
        .await
        .unwrap_err();
    assert!(matches!(&err, Fault::Upstream(message) if message == "404 Not Found"));

    assert!(capture.samples_named("fetch_data_requests_total").is_empty());
    assert_eq!(
        capture.samples_named("fetch_data_requests_failed_total").len(),
        1
    );

    let spans = capture.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, SpanStatus::Error);
    assert_eq!(
        spans[0].attributes.get("error.category").map(String::as_str),
        Some("upstream_failure")
    );

    let errors: Vec<_> = capture
        .logs()
        .into_iter()
        .filter(|l| l.message == "operation failed")
        .collect();
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn concurrent_invocations_keep_their_labels_apart() {
    let (telemetry, capture) = telemetry();

    let a = telemetry
        .operation("llm.generate")
        .metric_base("llm")
        .label("model", "a")
        .run(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Fault>(())
        });
    let b = telemetry
        .operation("llm.generate")
        .metric_base("llm")
        .label("model", "b")
        .run(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Fault>(())
        });
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();

    let samples = capture.samples_named("llm_requests_total");
    assert_eq!(samples.len(), 2);
    let mut models: Vec<_> = samples
        .iter()
        .map(|s| s.labels.get("model").unwrap().to_string())
        .collect();
    models.sort();
    assert_eq!(models, vec!["a", "b"]);

    // Concurrent root operations do not become each other's parents.
    let spans = capture.spans();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.parent.is_none()));
}

#[tokio::test]
async fn absent_secondary_quantity_is_silent() {
    let (telemetry, capture) = telemetry();
    let tokens = telemetry
        .registry()
        .counter("llm_tokens_total", "Total LLM tokens consumed")
        .unwrap();

    telemetry
        .operation("llm.generate")
        .metric_base("llm")
        .run_counting(&tokens, |t: &Option<u64>| *t, || async {
            Ok::<_, Fault>(None)
        })
        .await
        .unwrap();

    assert!(capture.samples_named("llm_tokens_total").is_empty());
    assert_eq!(capture.spans()[0].status, SpanStatus::Ok);
}

#[tokio::test]
async fn cancelled_operation_still_closes_its_span() {
    let (telemetry, capture) = telemetry();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        telemetry.operation("slow_operation").run(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Fault>(())
        }),
    )
    .await;
    assert!(result.is_err());

    let spans = capture.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, SpanStatus::Error);
    assert_eq!(
        spans[0].attributes.get("error.category").map(String::as_str),
        Some("cancelled")
    );

    assert_eq!(
        capture
            .samples_named("slow_operation_requests_failed_total")
            .len(),
        1
    );
    let errors: Vec<_> = capture
        .logs()
        .into_iter()
        .filter(|l| l.message == "operation failed")
        .collect();
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn nested_operations_form_a_trace() {
    let (telemetry, capture) = telemetry();

    let inner_telemetry = telemetry.clone();
    telemetry
        .operation("generate_text")
        .run(|| async move {
            inner_telemetry
                .operation("llm.generate")
                .metric_base("llm")
                .run(|| async { Ok::<_, Fault>(()) })
                .await
        })
        .await
        .unwrap();

    let spans = capture.spans();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].name, "llm.generate");
    assert_eq!(spans[1].name, "generate_text");
    assert_eq!(spans[0].parent, Some(spans[1].id));
}

#[tokio::test]
async fn manual_span_rejects_double_close() {
    let (telemetry, capture) = telemetry();
    let mut span = telemetry.span("initialize_store");
    span.close(SpanStatus::Ok).unwrap();
    assert!(span.close(SpanStatus::Ok).is_err());
    assert_eq!(capture.spans().len(), 1);
}
