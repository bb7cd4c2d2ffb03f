// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request-scoped wrapper around one inference call.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::Context;

use super::InferenceMonitor;
use crate::error::{Classify, ErrorKind};

/// Rough token count: whitespace-separated words.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

struct ActiveTrace {
    monitor: Arc<InferenceMonitor>,
    cx: Context,
    start: Instant,
    first_token: Option<Instant>,
    input_tokens: usize,
}

/// Span plus timing for one inference.
///
/// Built from an optional monitor; without an enabled one every method
/// is a no-op.
/// Dropping an unfinished trace records a cancellation.
pub struct ChatTrace {
    active: Option<ActiveTrace>,
}

impl ChatTrace {
    pub fn start(monitor: Option<Arc<InferenceMonitor>>, parent: &Context, input_tokens: usize) -> Self {
        let active = monitor.filter(|m| m.is_enabled()).map(|monitor| {
            let cx = monitor.trace_inference(parent, input_tokens);
            ActiveTrace { monitor, cx, start: Instant::now(), first_token: None, input_tokens }
        });
        Self { active }
    }

    pub fn noop() -> Self {
        Self { active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Context holding the inference span, for child spans.
    pub fn context(&self) -> Context {
        self.active.as_ref().map(|a| a.cx.clone()).unwrap_or_default()
    }

    /// Note the first streamed token. Later calls are ignored.
    pub fn mark_first_token(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if active.first_token.is_none() {
                active.first_token = Some(Instant::now());
            }
        }
    }

    /// Commit metrics, then close the span.
    pub fn finish<E: Classify>(mut self, output_tokens: usize, result: Result<(), &E>) {
        let Some(active) = self.active.take() else { return };
        match result {
            Ok(()) => complete(&active, output_tokens),
            Err(e) => fail(&active, e.error_kind(), &e.to_string()),
        }
        active.monitor.tracer().end(&active.cx);
    }
}

impl Drop for ChatTrace {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            fail(&active, ErrorKind::Cancelled, "request dropped before completion");
            active.monitor.tracer().end(&active.cx);
        }
    }
}

fn complete(active: &ActiveTrace, output_tokens: usize) {
    let monitor = &active.monitor;
    monitor.record_inference_metrics(active.start, active.input_tokens, output_tokens, active.first_token);

    let tracer = monitor.tracer();
    if let Some(first) = active.first_token {
        tracer.record_first_token_latency(&active.cx, first.saturating_duration_since(active.start));
    }
    if let Some(snapshot) = monitor.latest_snapshot() {
        tracer.record_kv_cache_info(&active.cx, snapshot.memory.kv_cache_bytes, snapshot.memory.kv_cache_max_bytes);
        tracer.record_memory_usage(&active.cx, snapshot.memory.used_bytes, snapshot.memory.total_bytes);
        tracer.record_tokens_per_second(&active.cx, snapshot.performance.tokens_per_second);
    }
}

fn fail(active: &ActiveTrace, kind: ErrorKind, message: &str) {
    active.monitor.record_error(kind);
    active.monitor.tracer().record_error(&active.cx, kind, message);
}
