// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! OTLP span export and the request-scoped span API.
//!
//! Spans travel inside an [`opentelemetry::Context`]; the `record_*`
//! operations annotate whatever span that context currently holds and
//! are silent no-ops when it holds none.

use std::time::Duration;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TracingConfig;
use crate::error::ErrorKind;
use crate::monitor::ModelConfig;

pub const INFERENCE_SPAN: &str = "llamacpp.inference";
pub const TOKEN_GENERATION_SPAN: &str = "llamacpp.token_generation";
pub const TOKEN_EVENT: &str = "token.generated";

const INSTRUMENTATION_NAME: &str = "llamacpp-observer";

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Failed to create OTLP exporter: {0}")]
    Exporter(String),

    #[error("Invalid OTLP endpoint {0:?}")]
    Endpoint(String),
}

impl TracerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TracerError::Exporter(_) => ErrorKind::Network,
            TracerError::Endpoint(_) => ErrorKind::Validation,
        }
    }
}

/// Span factory backed by an SDK tracer provider.
#[derive(Debug, Clone)]
pub struct Tracer {
    provider: TracerProvider,
    tracer: opentelemetry_sdk::trace::Tracer,
}

impl Tracer {
    /// Build the OTLP/HTTP pipeline. Sampling is always on.
    pub fn new(config: &TracingConfig) -> Result<Self, TracerError> {
        if !config.enabled {
            info!("Tracing disabled, spans will not be exported");
            return Ok(Self::disabled());
        }
        let endpoint = traces_endpoint(&config.endpoint)?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| TracerError::Exporter(e.to_string()))?;

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(Resource::new(vec![KeyValue::new("service.name", config.service_name.clone())]))
            .build();
        info!(endpoint = %endpoint, service = %config.service_name, "OTLP tracer initialized");
        Ok(Self::with_provider(provider))
    }

    /// Tracer whose spans go nowhere.
    pub fn disabled() -> Self {
        Self::with_provider(TracerProvider::builder().build())
    }

    /// Wrap an already configured provider.
    pub fn with_provider(provider: TracerProvider) -> Self {
        let tracer = provider.tracer(INSTRUMENTATION_NAME);
        Self { provider, tracer }
    }

    /// Start `llamacpp.inference` under `parent`.
    pub fn trace_inference(&self, parent: &Context, model: &ModelConfig, input_tokens: usize) -> Context {
        let span = self
            .tracer
            .span_builder(INFERENCE_SPAN)
            .with_kind(SpanKind::Internal)
            .with_attributes(vec![
                KeyValue::new("model.name", model.name.clone()),
                KeyValue::new("model.size", model.size.clone()),
                KeyValue::new("model.quantization", model.quantization.clone()),
                KeyValue::new("tokens.input", input_tokens as i64),
            ])
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    /// Start `llamacpp.token_generation` under `parent`.
    pub fn trace_token_generation(&self, parent: &Context, batch_size: usize) -> Context {
        let span = self
            .tracer
            .span_builder(TOKEN_GENERATION_SPAN)
            .with_kind(SpanKind::Internal)
            .with_attributes(vec![KeyValue::new("batch.size", batch_size as i64)])
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    pub fn record_generated_token(&self, cx: &Context, token_id: i64, token_text: &str, probability: f64) {
        cx.span().add_event(
            TOKEN_EVENT,
            vec![
                KeyValue::new("token.id", token_id),
                KeyValue::new("token.text", token_text.to_string()),
                KeyValue::new("token.probability", probability),
            ],
        );
    }

    pub fn record_kv_cache_info(&self, cx: &Context, used_bytes: u64, max_bytes: u64) {
        let span = cx.span();
        span.set_attribute(KeyValue::new("kv_cache.used_bytes", used_bytes as i64));
        span.set_attribute(KeyValue::new("kv_cache.max_bytes", max_bytes as i64));
        if max_bytes > 0 {
            span.set_attribute(KeyValue::new("kv_cache.utilization", used_bytes as f64 / max_bytes as f64));
        }
    }

    pub fn record_memory_usage(&self, cx: &Context, used_bytes: u64, total_bytes: u64) {
        let span = cx.span();
        span.set_attribute(KeyValue::new("memory.used_bytes", used_bytes as i64));
        span.set_attribute(KeyValue::new("memory.total_bytes", total_bytes as i64));
    }

    pub fn record_tokens_per_second(&self, cx: &Context, tokens_per_second: f64) {
        cx.span().set_attribute(KeyValue::new("performance.tokens_per_second", tokens_per_second));
    }

    pub fn record_first_token_latency(&self, cx: &Context, latency: Duration) {
        cx.span().set_attribute(KeyValue::new("latency.first_token_ms", latency.as_secs_f64() * 1000.0));
    }

    /// Mark the span failed. The span stays open.
    pub fn record_error(&self, cx: &Context, kind: ErrorKind, message: &str) {
        let span = cx.span();
        span.set_attribute(KeyValue::new("error.kind", kind.as_str()));
        span.set_status(Status::error(message.to_string()));
    }

    /// End the span held by `cx`.
    pub fn end(&self, cx: &Context) {
        cx.span().end();
    }

    /// Flush and stop the exporter, waiting at most `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        let provider = self.provider.clone();
        let flush = tokio::task::spawn_blocking(move || {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    warn!(error = %e, "Span flush failed");
                }
            }
            provider.shutdown()
        });
        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => info!("Tracer shut down"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Tracer shutdown reported an error"),
            Ok(Err(e)) => warn!(error = %e, "Tracer shutdown task failed"),
            Err(_) => warn!(timeout_ms = timeout.as_millis() as u64, "Tracer shutdown timed out, dropping spans"),
        }
    }
}

/// `http://host:4318` becomes `http://host:4318/v1/traces`; a bare
/// `host:port` is taken as plain HTTP.
pub(crate) fn traces_endpoint(raw: &str) -> Result<String, TracerError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(TracerError::Endpoint(raw.to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    if with_scheme.ends_with("/v1/traces") {
        Ok(with_scheme)
    } else {
        Ok(format!("{}/v1/traces", with_scheme))
    }
}

#[cfg(test)]
#[path = "tracer_tests.rs"]
mod tests;
