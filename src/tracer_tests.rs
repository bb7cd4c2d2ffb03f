//! Tests for the span API, asserted against an in-memory exporter.

use super::*;
use opentelemetry::trace::Status;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

fn in_memory() -> (Tracer, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (Tracer::with_provider(provider), exporter)
}

fn attr<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
    span.attributes.iter().find(|kv| kv.key.as_str() == key).map(|kv| &kv.value)
}

fn model() -> ModelConfig {
    ModelConfig {
        name: "llama-7b".to_string(),
        size: "7B".to_string(),
        quantization: "Q4_K_M".to_string(),
        context_size: 4096,
    }
}

#[test]
fn test_inference_span_attributes() {
    let (tracer, exporter) = in_memory();
    let cx = tracer.trace_inference(&Context::new(), &model(), 12);
    tracer.record_kv_cache_info(&cx, 256, 1024);
    tracer.record_tokens_per_second(&cx, 42.5);
    tracer.end(&cx);

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, INFERENCE_SPAN);
    assert_eq!(attr(span, "model.name").unwrap().as_str(), "llama-7b");
    assert_eq!(attr(span, "model.quantization").unwrap().as_str(), "Q4_K_M");
    assert_eq!(attr(span, "tokens.input"), Some(&opentelemetry::Value::I64(12)));
    assert_eq!(attr(span, "kv_cache.utilization"), Some(&opentelemetry::Value::F64(0.25)));
    assert_eq!(attr(span, "performance.tokens_per_second"), Some(&opentelemetry::Value::F64(42.5)));
}

#[test]
fn test_token_generation_is_child_with_events() {
    let (tracer, exporter) = in_memory();
    let root = tracer.trace_inference(&Context::new(), &model(), 3);
    let gen = tracer.trace_token_generation(&root, 8);
    tracer.record_generated_token(&gen, 17, "hello", 0.9);
    tracer.record_generated_token(&gen, 18, " world", 0.8);
    tracer.end(&gen);
    tracer.end(&root);

    let spans = exporter.get_finished_spans().unwrap();
    let gen_span = spans.iter().find(|s| s.name == TOKEN_GENERATION_SPAN).unwrap();
    let root_span = spans.iter().find(|s| s.name == INFERENCE_SPAN).unwrap();
    assert_eq!(gen_span.parent_span_id, root_span.span_context.span_id());
    assert_eq!(attr(gen_span, "batch.size"), Some(&opentelemetry::Value::I64(8)));
    assert_eq!(gen_span.events.len(), 2);
    assert_eq!(gen_span.events[0].name, TOKEN_EVENT);
}

#[test]
fn test_error_sets_status() {
    let (tracer, exporter) = in_memory();
    let cx = tracer.trace_inference(&Context::new(), &model(), 1);
    tracer.record_error(&cx, ErrorKind::Inference, "engine went away");
    tracer.end(&cx);

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans[0].status, Status::error("engine went away"));
    assert_eq!(attr(&spans[0], "error.kind").unwrap().as_str(), "inference_error");
}

#[test]
fn test_record_without_span_is_noop() {
    let (tracer, exporter) = in_memory();
    let cx = Context::new();
    tracer.record_memory_usage(&cx, 1, 2);
    tracer.record_first_token_latency(&cx, Duration::from_millis(5));
    tracer.end(&cx);
    assert!(exporter.get_finished_spans().unwrap().is_empty());
}

#[test]
fn test_traces_endpoint_normalisation() {
    assert_eq!(traces_endpoint("http://jaeger:4318").unwrap(), "http://jaeger:4318/v1/traces");
    assert_eq!(traces_endpoint("jaeger:4318/").unwrap(), "http://jaeger:4318/v1/traces");
    assert_eq!(
        traces_endpoint("https://otel.example/v1/traces").unwrap(),
        "https://otel.example/v1/traces"
    );
    assert!(traces_endpoint("  ").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_tracer_shutdown_is_bounded() {
    let tracer = Tracer::disabled();
    let cx = tracer.trace_inference(&Context::new(), &model(), 1);
    tracer.end(&cx);
    tokio::time::timeout(Duration::from_secs(5), tracer.shutdown(Duration::from_secs(1)))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enabled_tracer_builds_and_shuts_down() {
    let config = TracingConfig {
        enabled: true,
        endpoint: "127.0.0.1:1".to_string(),
        service_name: "llama-cpp-monitor".to_string(),
    };
    let tracer = Tracer::new(&config).unwrap();
    let cx = tracer.trace_inference(&Context::new(), &model(), 3);
    tracer.end(&cx);
    tokio::time::timeout(Duration::from_secs(5), tracer.shutdown(Duration::from_secs(1)))
        .await
        .unwrap();
}
