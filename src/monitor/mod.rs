// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-request inference monitor.
//!
//! The monitor combines the metric registry (per-request counters and
//! latencies) with the tracer (span lifecycle). It travels with each HTTP
//! request as an axum extension; code that finds no monitor there
//! degrades to no-ops.

mod chat_trace;
mod model_config;
mod monitored_llm;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::Extensions;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::Context;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use chat_trace::{estimate_tokens, ChatTrace};
pub use model_config::{fetch_model_config, load_model_config, ModelConfig, ModelInfoError};
pub use monitored_llm::MonitoredLlm;

use crate::error::ErrorKind;
use crate::metrics::catalogue::{
    CONTEXT_OVERFLOW_TOTAL, DECODE_TOKENS_TOTAL, ERRORS_TOTAL, FIRST_TOKEN_LATENCY_SECONDS,
    INFERENCE_LATENCY_SECONDS, PREFILL_TOKENS_TOTAL,
};
use crate::metrics::{MetricRegistry, RegistryError};
use crate::scrape::{ScrapeLoop, SnapshotCell};
use crate::shutdown::ShutdownCoordinator;
use crate::stats::StatsSnapshot;
use crate::tracer::Tracer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Monitor is not enabled")]
    Disabled,

    #[error("Stats collector already running")]
    AlreadyStarted,
}

struct MonitorState {
    enabled: bool,
    model: ModelConfig,
    collector: Option<CancellationToken>,
}

pub struct InferenceMonitor {
    state: Mutex<MonitorState>,
    registry: MetricRegistry,
    tracer: Tracer,
    latest: SnapshotCell,
}

impl InferenceMonitor {
    pub fn new(registry: MetricRegistry, tracer: Tracer, model: ModelConfig) -> Self {
        Self {
            state: Mutex::new(MonitorState { enabled: true, model, collector: None }),
            registry,
            tracer,
            latest: SnapshotCell::new(),
        }
    }

    /// Read snapshots published by an externally driven scrape loop.
    pub fn with_snapshot_cell(mut self, cell: SnapshotCell) -> Self {
        self.latest = cell;
        self
    }

    /// Build a monitor whose model labels come from `<endpoint>/info`.
    pub async fn connect(
        http: &reqwest::Client,
        endpoint: &str,
        registry: MetricRegistry,
        tracer: Tracer,
    ) -> Self {
        let model = load_model_config(http, endpoint).await;
        info!(
            model = %model.name,
            size = %model.size,
            quantization = %model.quantization,
            context_size = model.context_size,
            "Inference monitor ready"
        );
        Self::new(registry, tracer, model)
    }

    /// Run `scrape` as this monitor's stats collector.
    pub fn start(&self, scrape: ScrapeLoop, shutdown: &ShutdownCoordinator) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if !state.enabled {
            return Err(MonitorError::Disabled);
        }
        if state.collector.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return Err(MonitorError::AlreadyStarted);
        }
        let token = shutdown.token().child_token();
        state.collector = Some(token.clone());
        drop(state);

        let scrape = scrape.with_snapshot_cell(self.latest.clone());
        shutdown.spawn("stats-collector", scrape.run(token));
        Ok(())
    }

    /// Stop the stats collector. Recording continues.
    pub fn stop(&self) {
        if let Some(token) = self.state.lock().collector.take() {
            token.cancel();
            debug!("Stats collector stopped");
        }
    }

    pub fn enable(&self) {
        self.state.lock().enabled = true;
    }

    /// Turn every record operation into a no-op and stop the collector.
    pub fn disable(&self) {
        let collector = {
            let mut state = self.state.lock();
            state.enabled = false;
            state.collector.take()
        };
        if let Some(token) = collector {
            token.cancel();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn model_config(&self) -> ModelConfig {
        self.state.lock().model.clone()
    }

    pub fn set_model_config(&self, model: ModelConfig) {
        self.state.lock().model = model;
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn latest_snapshot(&self) -> Option<StatsSnapshot> {
        self.latest.latest()
    }

    /// Model config if enabled, `None` otherwise.
    fn active_model(&self) -> Option<ModelConfig> {
        let state = self.state.lock();
        state.enabled.then(|| state.model.clone())
    }

    /// Open an inference span. Disabled monitors return `parent` as is.
    pub fn trace_inference(&self, parent: &Context, input_tokens: usize) -> Context {
        match self.active_model() {
            Some(model) => self.tracer.trace_inference(parent, &model, input_tokens),
            None => parent.clone(),
        }
    }

    pub fn record_inference_metrics(
        &self,
        start: Instant,
        prefill_tokens: usize,
        decode_tokens: usize,
        first_token: Option<Instant>,
    ) {
        let Some(model) = self.active_model() else { return };
        let labels = inference_labels(&model);
        let result = (|| -> Result<(), RegistryError> {
            self.registry.set(INFERENCE_LATENCY_SECONDS, &labels, start.elapsed().as_secs_f64())?;
            self.registry.inc(PREFILL_TOKENS_TOTAL, &labels, prefill_tokens as f64)?;
            self.registry.inc(DECODE_TOKENS_TOTAL, &labels, decode_tokens as f64)?;
            if let Some(first) = first_token {
                let latency = first.saturating_duration_since(start).as_secs_f64();
                self.registry.set(FIRST_TOKEN_LATENCY_SECONDS, &labels, latency)?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            warn!(error = %e, "Failed to record inference metrics");
        }
    }

    pub fn record_context_overflow(&self) {
        let Some(model) = self.active_model() else { return };
        if let Err(e) = self.registry.inc(CONTEXT_OVERFLOW_TOTAL, &inference_labels(&model), 1.0) {
            warn!(error = %e, "Failed to record context overflow");
        }
    }

    pub fn record_error(&self, kind: ErrorKind) {
        let Some(model) = self.active_model() else { return };
        let labels = [
            model.name.as_str(),
            model.size.as_str(),
            model.quantization.as_str(),
            kind.as_str(),
        ];
        if let Err(e) = self.registry.inc(ERRORS_TOTAL, &labels, 1.0) {
            warn!(error = %e, "Failed to record inference error");
        }
    }
}

impl std::fmt::Debug for InferenceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InferenceMonitor")
            .field("enabled", &state.enabled)
            .field("model", &state.model)
            .finish()
    }
}

fn inference_labels(model: &ModelConfig) -> [&str; 3] {
    [model.name.as_str(), model.size.as_str(), model.quantization.as_str()]
}

/// Middleware inserting the monitor into each request's extensions.
pub async fn attach(
    State(monitor): State<Arc<InferenceMonitor>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(monitor);
    next.run(request).await
}

/// Monitor attached by [`attach`], if any.
pub fn from_extensions(extensions: &Extensions) -> Option<Arc<InferenceMonitor>> {
    extensions.get::<Arc<InferenceMonitor>>().cloned()
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
