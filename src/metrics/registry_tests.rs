//! Tests for the metric registry and its text rendering.

use super::*;
use crate::metrics::catalogue::*;

fn registry() -> MetricRegistry {
    MetricRegistry::new(BucketSpec::default())
}

#[test]
fn test_gauge_set_overwrites() {
    let r = registry();
    r.set(MEMORY_USAGE_BYTES, &["llama"], 10.0).unwrap();
    r.set(MEMORY_USAGE_BYTES, &["llama"], 1024.0).unwrap();
    assert_eq!(r.value(MEMORY_USAGE_BYTES, &["llama"]), Some(1024.0));
    assert_eq!(r.series_count(), 1);
}

#[test]
fn test_unknown_metric_rejected() {
    let err = registry().set("llamacpp_bogus", &["llama"], 1.0).unwrap_err();
    assert_eq!(err, RegistryError::UnknownMetric("llamacpp_bogus".to_string()));
}

#[test]
fn test_wrong_kind_rejected() {
    let r = registry();
    assert!(matches!(
        r.observe(MEMORY_USAGE_BYTES, &["llama"], 1.0),
        Err(RegistryError::WrongKind { expected: "histogram", actual: "gauge", .. })
    ));
    assert!(matches!(
        r.set(DECODE_TOKENS_TOTAL, &["m", "7B", "Q4"], 1.0),
        Err(RegistryError::WrongKind { .. })
    ));
}

#[test]
fn test_label_arity_and_empty_values_rejected() {
    let r = registry();
    assert!(matches!(
        r.set(MEMORY_USAGE_BYTES, &[], 1.0),
        Err(RegistryError::LabelMismatch { expected: 1, actual: 0, .. })
    ));
    assert!(matches!(
        r.set(MEMORY_USAGE_BYTES, &[""], 1.0),
        Err(RegistryError::EmptyLabel { label: "model", .. })
    ));
    assert_eq!(r.series_count(), 0);
}

#[test]
fn test_counter_accumulates_and_refuses_negative() {
    let r = registry();
    let labels = ["m", "7B", "Q4"];
    r.inc(DECODE_TOKENS_TOTAL, &labels, 3.0).unwrap();
    r.inc(DECODE_TOKENS_TOTAL, &labels, 2.0).unwrap();
    assert_eq!(r.value(DECODE_TOKENS_TOTAL, &labels), Some(5.0));
    assert!(matches!(
        r.inc(DECODE_TOKENS_TOTAL, &labels, -1.0),
        Err(RegistryError::NegativeDelta { .. })
    ));
    assert_eq!(r.value(DECODE_TOKENS_TOTAL, &labels), Some(5.0));
}

#[test]
fn test_histogram_buckets_are_cumulative() {
    let r = registry();
    // Default bounds: 0.001, 0.006, 0.011, ...
    r.observe(BATCH_LATENCY_SECONDS, &["llama"], 0.005).unwrap();
    r.observe(BATCH_LATENCY_SECONDS, &["llama"], 0.010).unwrap();
    r.observe(BATCH_LATENCY_SECONDS, &["llama"], 5.0).unwrap();

    let h = r.histogram(BATCH_LATENCY_SECONDS, &["llama"]).unwrap();
    assert_eq!(h.count, 3);
    assert!((h.sum - 5.015).abs() < 1e-9);
    assert_eq!(h.buckets.len(), 10);
    assert_eq!(h.buckets[0].1, 0);
    assert_eq!(h.buckets[1].1, 1);
    assert_eq!(h.buckets[2].1, 2);
    assert_eq!(h.buckets[9].1, 2);
}

#[test]
fn test_render_includes_help_type_and_labels() {
    let r = registry();
    r.set(MEMORY_USAGE_BYTES, &["llama"], 1024.0).unwrap();
    r.observe(BATCH_LATENCY_SECONDS, &["llama"], 0.005).unwrap();

    let text = r.render();
    assert!(text.contains("# HELP llamacpp_memory_usage_bytes Memory usage by llama.cpp in bytes\n"));
    assert!(text.contains("# TYPE llamacpp_memory_usage_bytes gauge\n"));
    assert!(text.contains("llamacpp_memory_usage_bytes{model=\"llama\"} 1024\n"));
    assert!(text.contains("# TYPE llamacpp_batch_latency_seconds histogram\n"));
    assert!(text.contains("llamacpp_batch_latency_seconds_bucket{model=\"llama\",le=\"+Inf\"} 1\n"));
    assert!(text.contains("llamacpp_batch_latency_seconds_count{model=\"llama\"} 1\n"));
    assert!(text.contains("llamacpp_batch_latency_seconds_sum{model=\"llama\"} 0.005\n"));
    // Families with no series are omitted.
    assert!(!text.contains("llamacpp_tokens_per_second"));
}

#[test]
fn test_render_is_stable_without_updates() {
    let r = registry();
    for model in ["b", "a", "c"] {
        r.set(TOKENS_PER_SECOND, &[model], 12.5).unwrap();
        r.observe(BATCH_LATENCY_SECONDS, &[model], 0.0075).unwrap();
    }
    assert_eq!(r.render(), r.render());
}

#[test]
fn test_render_orders_series_and_escapes_labels() {
    let r = registry();
    r.set(THREAD_COUNT, &["zeta"], 2.0).unwrap();
    r.set(THREAD_COUNT, &["alpha \"quoted\""], 1.0).unwrap();

    let text = r.render();
    let alpha = text.find("model=\"alpha \\\"quoted\\\"\"").unwrap();
    let zeta = text.find("model=\"zeta\"").unwrap();
    assert!(alpha < zeta);
}

#[test]
fn test_render_special_floats() {
    let r = registry();
    r.set(TOKENS_PER_SECOND, &["a"], f64::NAN).unwrap();
    r.set(TOKENS_PER_SECOND, &["b"], f64::INFINITY).unwrap();
    let text = r.render();
    assert!(text.contains("llamacpp_tokens_per_second{model=\"a\"} NaN\n"));
    assert!(text.contains("llamacpp_tokens_per_second{model=\"b\"} +Inf\n"));
}

#[test]
fn test_concurrent_updates_do_not_lose_increments() {
    let r = registry();
    let labels = ["m", "7B", "Q4"];
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..1000 {
                    r.inc(PREFILL_TOKENS_TOTAL, &labels, 1.0).unwrap();
                }
            });
        }
    });
    assert_eq!(r.value(PREFILL_TOKENS_TOTAL, &labels), Some(8000.0));
}

#[test]
fn test_custom_buckets() {
    let r = MetricRegistry::new(BucketSpec { start: 0.1, width: 0.1, count: 3 });
    r.observe(BATCH_LATENCY_SECONDS, &["llama"], 0.15).unwrap();
    let h = r.histogram(BATCH_LATENCY_SECONDS, &["llama"]).unwrap();
    let bounds: Vec<f64> = h.buckets.iter().map(|(b, _)| *b).collect();
    assert_eq!(bounds.len(), 3);
    assert!((bounds[2] - 0.3).abs() < 1e-9);
    assert_eq!(h.buckets[0].1, 0);
    assert_eq!(h.buckets[1].1, 1);
}
