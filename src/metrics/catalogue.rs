// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The fixed set of series the registry accepts.

use crate::config::BucketSpec;

pub const MEMORY_USAGE_BYTES: &str = "llamacpp_memory_usage_bytes";
pub const TOTAL_MEMORY_BYTES: &str = "llamacpp_total_memory_bytes";
pub const TOKENS_PER_SECOND: &str = "llamacpp_tokens_per_second";
pub const CPU_UTILIZATION_PERCENT: &str = "llamacpp_cpu_utilization_percent";
pub const GPU_UTILIZATION_PERCENT: &str = "llamacpp_gpu_utilization_percent";
pub const TEMPERATURE_CELSIUS: &str = "llamacpp_temperature_celsius";
pub const CONTEXT_SIZE_TOKENS: &str = "llamacpp_context_size_tokens";
pub const MAX_CONTEXT_SIZE_TOKENS: &str = "llamacpp_max_context_size_tokens";
pub const MODEL_SIZE_BYTES: &str = "llamacpp_model_size_bytes";
pub const MODEL_PARAMETERS: &str = "llamacpp_model_parameters";
pub const BATCH_SIZE: &str = "llamacpp_batch_size";
pub const OPTIMAL_BATCH_SIZE: &str = "llamacpp_optimal_batch_size";
pub const BATCH_LATENCY_SECONDS: &str = "llamacpp_batch_latency_seconds";
pub const KV_CACHE_USAGE_BYTES: &str = "llamacpp_kv_cache_usage_bytes";
pub const KV_CACHE_LIMIT_BYTES: &str = "llamacpp_kv_cache_limit_bytes";
pub const THREAD_COUNT: &str = "llamacpp_thread_count";
pub const STATUS: &str = "llamacpp_status";

pub const INFERENCE_LATENCY_SECONDS: &str = "llamacpp_inference_latency_seconds";
pub const FIRST_TOKEN_LATENCY_SECONDS: &str = "llamacpp_first_token_latency_seconds";
pub const PREFILL_TOKENS_TOTAL: &str = "llamacpp_prefill_tokens_total";
pub const DECODE_TOKENS_TOTAL: &str = "llamacpp_decode_tokens_total";
pub const CONTEXT_OVERFLOW_TOTAL: &str = "llamacpp_context_overflow_total";
pub const ERRORS_TOTAL: &str = "llamacpp_errors_total";

/// Labels on every scraped engine series.
pub const ENGINE_LABELS: &[&str] = &["model"];
/// Labels on per-request inference series.
pub const INFERENCE_LABELS: &[&str] = &["model", "size", "quantization"];
pub const ERROR_LABELS: &[&str] = &["model", "size", "quantization", "kind"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Static description of one metric family.
#[derive(Debug, Clone)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: &'static [&'static str],
    /// Upper bounds, histograms only.
    pub buckets: Vec<f64>,
}

impl MetricDesc {
    fn gauge(name: &'static str, help: &'static str, label_names: &'static [&'static str]) -> Self {
        Self { name, help, kind: MetricKind::Gauge, label_names, buckets: Vec::new() }
    }

    fn counter(name: &'static str, help: &'static str, label_names: &'static [&'static str]) -> Self {
        Self { name, help, kind: MetricKind::Counter, label_names, buckets: Vec::new() }
    }

    fn histogram(name: &'static str, help: &'static str, buckets: Vec<f64>) -> Self {
        Self { name, help, kind: MetricKind::Histogram, label_names: ENGINE_LABELS, buckets }
    }
}

/// `count` upper bounds: `start, start + width, ...`.
pub fn linear_buckets(spec: BucketSpec) -> Vec<f64> {
    (0..spec.count).map(|i| spec.start + spec.width * i as f64).collect()
}

/// The full catalogue, in exposition order.
pub fn standard(batch_buckets: BucketSpec) -> Vec<MetricDesc> {
    vec![
        MetricDesc::gauge(MEMORY_USAGE_BYTES, "Memory usage by llama.cpp in bytes", ENGINE_LABELS),
        MetricDesc::gauge(TOTAL_MEMORY_BYTES, "Total memory available to llama.cpp in bytes", ENGINE_LABELS),
        MetricDesc::gauge(TOKENS_PER_SECOND, "Tokens processed per second by llama.cpp", ENGINE_LABELS),
        MetricDesc::gauge(CPU_UTILIZATION_PERCENT, "CPU utilization by llama.cpp in percent", ENGINE_LABELS),
        MetricDesc::gauge(GPU_UTILIZATION_PERCENT, "GPU utilization by llama.cpp in percent", ENGINE_LABELS),
        MetricDesc::gauge(TEMPERATURE_CELSIUS, "GPU temperature in celsius", ENGINE_LABELS),
        MetricDesc::gauge(CONTEXT_SIZE_TOKENS, "Current context size in tokens", ENGINE_LABELS),
        MetricDesc::gauge(MAX_CONTEXT_SIZE_TOKENS, "Maximum context size in tokens", ENGINE_LABELS),
        MetricDesc::gauge(MODEL_SIZE_BYTES, "Model size in bytes", ENGINE_LABELS),
        MetricDesc::gauge(MODEL_PARAMETERS, "Number of parameters in the model", ENGINE_LABELS),
        MetricDesc::gauge(BATCH_SIZE, "Current batch size in tokens", ENGINE_LABELS),
        MetricDesc::gauge(OPTIMAL_BATCH_SIZE, "Optimal batch size in tokens", ENGINE_LABELS),
        MetricDesc::histogram(
            BATCH_LATENCY_SECONDS,
            "Batch processing latency in seconds",
            linear_buckets(batch_buckets),
        ),
        MetricDesc::gauge(KV_CACHE_USAGE_BYTES, "KV cache usage in bytes", ENGINE_LABELS),
        MetricDesc::gauge(KV_CACHE_LIMIT_BYTES, "KV cache limit in bytes", ENGINE_LABELS),
        MetricDesc::gauge(THREAD_COUNT, "Number of threads used by llama.cpp", ENGINE_LABELS),
        MetricDesc::gauge(
            STATUS,
            "Status of llama.cpp (0 = unknown, 1 = idle, 2 = loading, 3 = running)",
            ENGINE_LABELS,
        ),
        MetricDesc::gauge(
            INFERENCE_LATENCY_SECONDS,
            "End-to-end latency of the most recent inference in seconds",
            INFERENCE_LABELS,
        ),
        MetricDesc::gauge(
            FIRST_TOKEN_LATENCY_SECONDS,
            "Time to first streamed token of the most recent inference in seconds",
            INFERENCE_LABELS,
        ),
        MetricDesc::counter(PREFILL_TOKENS_TOTAL, "Prompt tokens processed", INFERENCE_LABELS),
        MetricDesc::counter(DECODE_TOKENS_TOTAL, "Tokens generated", INFERENCE_LABELS),
        MetricDesc::counter(
            CONTEXT_OVERFLOW_TOTAL,
            "Requests whose prompt exceeded the model context window",
            INFERENCE_LABELS,
        ),
        MetricDesc::counter(ERRORS_TOTAL, "Inference errors by kind", ERROR_LABELS),
    ]
}
