// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! LLM client decorator that traces every call through a monitor.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::Context;
use tokio_util::sync::CancellationToken;

use super::chat_trace::{estimate_tokens, ChatTrace};
use super::InferenceMonitor;
use crate::rag::llm::{LlmClient, LlmError};

/// Wraps an [`LlmClient`]; with no monitor it only forwards.
pub struct MonitoredLlm {
    inner: Arc<dyn LlmClient>,
    monitor: Option<Arc<InferenceMonitor>>,
}

impl MonitoredLlm {
    pub fn new(inner: Arc<dyn LlmClient>, monitor: Option<Arc<InferenceMonitor>>) -> Self {
        Self { inner, monitor }
    }

    fn begin(&self, prompt: &str) -> ChatTrace {
        let input_tokens = estimate_tokens(prompt);
        if let Some(monitor) = &self.monitor {
            if input_tokens > monitor.model_config().context_size {
                monitor.record_context_overflow();
            }
        }
        ChatTrace::start(self.monitor.clone(), &Context::current(), input_tokens)
    }
}

#[async_trait]
impl LlmClient for MonitoredLlm {
    async fn generate_completion(&self, cancel: &CancellationToken, prompt: &str) -> Result<String, LlmError> {
        let trace = self.begin(prompt);
        let result = self.inner.generate_completion(cancel, prompt).await;
        match &result {
            Ok(answer) => trace.finish::<LlmError>(estimate_tokens(answer), Ok(())),
            Err(e) => trace.finish(0, Err(e)),
        }
        result
    }

    async fn generate_stream(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str, bool) -> Result<(), LlmError> + Send),
    ) -> Result<(), LlmError> {
        let mut trace = self.begin(prompt);
        let mut output_tokens = 0usize;
        let mut counting = |text: &str, done: bool| {
            if !text.is_empty() {
                trace.mark_first_token();
                output_tokens += 1;
            }
            on_token(text, done)
        };
        let result = self.inner.generate_stream(cancel, prompt, &mut counting).await;

        match &result {
            Ok(()) => trace.finish::<LlmError>(output_tokens, Ok(())),
            Err(e) => trace.finish(output_tokens, Err(e)),
        }
        result
    }
}
