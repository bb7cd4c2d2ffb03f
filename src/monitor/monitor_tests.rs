//! Tests for the inference monitor, chat traces and the monitored LLM.

use super::*;
use crate::config::BucketSpec;
use crate::rag::llm::{LlmClient, LlmError};
use crate::stats::StatsClient;
use crate::test_support::{spawn_router, ScriptedLlm, SAMPLE_STATS};
use crate::tracer::INFERENCE_SPAN;
use axum::routing::get;
use axum::Router;
use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use std::time::Duration;

const LABELS: [&str; 3] = ["llama-7b", "7B", "Q4_K_M"];

fn model() -> ModelConfig {
    ModelConfig {
        name: LABELS[0].to_string(),
        size: LABELS[1].to_string(),
        quantization: LABELS[2].to_string(),
        context_size: 4096,
    }
}

fn monitor() -> (Arc<InferenceMonitor>, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let monitor = InferenceMonitor::new(
        MetricRegistry::new(BucketSpec::default()),
        Tracer::with_provider(provider),
        model(),
    );
    (Arc::new(monitor), exporter)
}

fn errors(monitor: &InferenceMonitor, kind: ErrorKind) -> Option<f64> {
    let labels = [LABELS[0], LABELS[1], LABELS[2], kind.as_str()];
    monitor.registry().value(ERRORS_TOTAL, &labels)
}

fn attr<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
    span.attributes.iter().find(|kv| kv.key.as_str() == key).map(|kv| &kv.value)
}

#[test]
fn test_disabled_monitor_is_noop() {
    let (monitor, exporter) = monitor();
    monitor.disable();
    assert!(!monitor.is_enabled());

    let cx = monitor.trace_inference(&Context::new(), 5);
    assert!(!cx.span().span_context().is_valid());
    monitor.record_inference_metrics(Instant::now(), 5, 5, Some(Instant::now()));
    monitor.record_error(ErrorKind::Inference);
    monitor.record_context_overflow();

    assert_eq!(monitor.registry().series_count(), 0);
    assert!(exporter.get_finished_spans().unwrap().is_empty());
}

#[test]
fn test_enable_restores_recording() {
    let (monitor, _exporter) = monitor();
    monitor.disable();
    monitor.record_context_overflow();
    monitor.enable();
    monitor.record_context_overflow();
    assert_eq!(monitor.registry().value(CONTEXT_OVERFLOW_TOTAL, &LABELS), Some(1.0));
}

#[test]
fn test_inference_metrics_recorded() {
    let (monitor, _exporter) = monitor();
    let start = Instant::now();
    monitor.record_inference_metrics(start, 10, 4, Some(start));
    monitor.record_inference_metrics(start, 2, 1, None);

    let registry = monitor.registry();
    assert_eq!(registry.value(PREFILL_TOKENS_TOTAL, &LABELS), Some(12.0));
    assert_eq!(registry.value(DECODE_TOKENS_TOTAL, &LABELS), Some(5.0));
    assert_eq!(registry.value(FIRST_TOKEN_LATENCY_SECONDS, &LABELS), Some(0.0));
    assert!(registry.value(INFERENCE_LATENCY_SECONDS, &LABELS).unwrap() >= 0.0);
}

#[test]
fn test_errors_counted_by_kind() {
    let (monitor, _exporter) = monitor();
    monitor.record_error(ErrorKind::Inference);
    monitor.record_error(ErrorKind::Inference);
    monitor.record_error(ErrorKind::Retrieval);
    assert_eq!(errors(&monitor, ErrorKind::Inference), Some(2.0));
    assert_eq!(errors(&monitor, ErrorKind::Retrieval), Some(1.0));
    assert_eq!(errors(&monitor, ErrorKind::Cancelled), None);
}

#[test]
fn test_chat_trace_success_enriches_span() {
    let (monitor, exporter) = monitor();
    let cell = SnapshotCell::new();
    cell.publish(serde_json::from_str(SAMPLE_STATS).unwrap());
    let monitor = Arc::new(
        Arc::try_unwrap(monitor).unwrap().with_snapshot_cell(cell),
    );

    let mut trace = ChatTrace::start(Some(monitor.clone()), &Context::new(), 3);
    assert!(trace.is_active());
    trace.mark_first_token();
    trace.finish::<LlmError>(7, Ok(()));

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, INFERENCE_SPAN);
    assert_eq!(attr(&spans[0], "kv_cache.utilization"), Some(&opentelemetry::Value::F64(0.25)));
    assert!(attr(&spans[0], "latency.first_token_ms").is_some());
    assert_eq!(monitor.registry().value(DECODE_TOKENS_TOTAL, &LABELS), Some(7.0));
    assert_eq!(monitor.registry().value(PREFILL_TOKENS_TOTAL, &LABELS), Some(3.0));
}

#[test]
fn test_chat_trace_failure_marks_span() {
    let (monitor, exporter) = monitor();
    let trace = ChatTrace::start(Some(monitor.clone()), &Context::new(), 3);
    let err = LlmError::BadStatus { status: 500, body: "boom".to_string() };
    trace.finish(0, Err(&err));

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans[0].status, Status::error(err.to_string()));
    assert_eq!(errors(&monitor, ErrorKind::Inference), Some(1.0));
    assert_eq!(monitor.registry().value(DECODE_TOKENS_TOTAL, &LABELS), None);
}

#[test]
fn test_dropped_trace_counts_as_cancelled() {
    let (monitor, exporter) = monitor();
    drop(ChatTrace::start(Some(monitor.clone()), &Context::new(), 1));
    assert_eq!(errors(&monitor, ErrorKind::Cancelled), Some(1.0));
    assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
}

#[test]
fn test_trace_without_monitor_is_noop() {
    let mut trace = ChatTrace::start(None, &Context::new(), 1);
    assert!(!trace.is_active());
    trace.mark_first_token();
    assert!(!trace.context().span().span_context().is_valid());
    trace.finish::<LlmError>(1, Ok(()));
    ChatTrace::noop().finish::<LlmError>(0, Ok(()));
}

#[tokio::test]
async fn test_monitored_stream_counts_tokens() {
    let (monitor, exporter) = monitor();
    let llm = MonitoredLlm::new(Arc::new(ScriptedLlm::new(&["a", "b", "c"])), Some(monitor.clone()));

    let mut text = String::new();
    llm.generate_stream(&CancellationToken::new(), "one two three four", &mut |t: &str, _: bool| {
        text.push_str(t);
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(text, "abc");
    let registry = monitor.registry();
    assert_eq!(registry.value(PREFILL_TOKENS_TOTAL, &LABELS), Some(4.0));
    assert_eq!(registry.value(DECODE_TOKENS_TOTAL, &LABELS), Some(3.0));
    assert!(registry.value(FIRST_TOKEN_LATENCY_SECONDS, &LABELS).is_some());
    assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
}

#[tokio::test]
async fn test_monitored_completion_records_overflow_and_errors() {
    let (monitor, _exporter) = monitor();
    monitor.set_model_config(ModelConfig { context_size: 2, ..model() });
    let failing = ScriptedLlm { fail_after: Some(0), ..ScriptedLlm::new(&["x"]) };
    let llm = MonitoredLlm::new(Arc::new(failing), Some(monitor.clone()));

    let err = llm
        .generate_completion(&CancellationToken::new(), "one two three")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inference);
    assert_eq!(monitor.registry().value(CONTEXT_OVERFLOW_TOTAL, &LABELS), Some(1.0));
    assert_eq!(errors(&monitor, ErrorKind::Inference), Some(1.0));
}

#[tokio::test]
async fn test_monitored_without_monitor_forwards() {
    let llm = MonitoredLlm::new(Arc::new(ScriptedLlm::new(&["hi"])), None);
    let answer = llm.generate_completion(&CancellationToken::new(), "q").await.unwrap();
    assert_eq!(answer, "hi");
}

#[tokio::test]
async fn test_start_requires_enabled_and_runs_once() {
    let (monitor, _exporter) = monitor();
    let shutdown = ShutdownCoordinator::new();
    let scrape = || {
        let client = StatsClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        ScrapeLoop::new(client, monitor.registry().clone(), "m", Duration::from_secs(60))
    };

    monitor.disable();
    assert_eq!(monitor.start(scrape(), &shutdown), Err(MonitorError::Disabled));

    monitor.enable();
    assert_eq!(monitor.start(scrape(), &shutdown), Ok(()));
    assert_eq!(monitor.start(scrape(), &shutdown), Err(MonitorError::AlreadyStarted));
    monitor.stop();
    assert_eq!(monitor.start(scrape(), &shutdown), Ok(()));

    let result = shutdown.initiate(Duration::from_secs(5)).await;
    assert_eq!(result, crate::shutdown::ShutdownResult::Complete);
}

#[tokio::test]
async fn test_attach_middleware_exposes_monitor() {
    let (monitor, _exporter) = monitor();
    let router = Router::new()
        .route(
            "/probe",
            get(|request: Request| async move {
                match from_extensions(request.extensions()) {
                    Some(m) => m.model_config().name,
                    None => "missing".to_string(),
                }
            }),
        )
        .layer(axum::middleware::from_fn_with_state(monitor, attach));
    let base = spawn_router(router).await;

    let body = reqwest::get(format!("{}/probe", base)).await.unwrap().text().await.unwrap();
    assert_eq!(body, "llama-7b");
    assert!(from_extensions(&Extensions::new()).is_none());
}
