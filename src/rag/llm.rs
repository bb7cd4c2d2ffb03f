// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! LLM completion capability and an OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{snippet, Classify, ErrorKind};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to decode LLM response: {0}")]
    Decode(String),

    #[error("Token consumer failed: {0}")]
    Callback(String),

    #[error("LLM request cancelled")]
    Cancelled,
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Inference,
        }
    }
}

impl Classify for LlmError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

/// Text generation backend.
///
/// `generate_stream` calls `on_token(text, done)` in generation order; the
/// last call has `done == true`. An error from `on_token` stops generation
/// and is returned unchanged.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_completion(&self, cancel: &CancellationToken, prompt: &str) -> Result<String, LlmError>;

    async fn generate_stream(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str, bool) -> Result<(), LlmError> + Send),
    ) -> Result<(), LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<MessageBody>,
    #[serde(default)]
    delta: Option<MessageBody>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-style `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url, model))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, model: impl Into<String>) -> Self {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self { http, endpoint, model: model.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            stream,
        };
        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::BadStatus { status: status.as_u16(), body: snippet(&text) });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_completion(&self, cancel: &CancellationToken, prompt: &str) -> Result<String, LlmError> {
        let work = async {
            let response = self.send(prompt, false).await?;
            let body = response.bytes().await?;
            let parsed: ChatResponse = serde_json::from_slice(&body).map_err(|e| {
                LlmError::Decode(format!("{} (body: {})", e, snippet(&String::from_utf8_lossy(&body))))
            })?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
                .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = work => result,
        }
    }

    async fn generate_stream(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str, bool) -> Result<(), LlmError> + Send),
    ) -> Result<(), LlmError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = self.send(prompt, true) => result?,
        };
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else { break };
            for line in lines.push(&chunk?) {
                match parse_sse_line(&line)? {
                    SseItem::Skip => {}
                    SseItem::Token { text, finished } => {
                        if cancel.is_cancelled() {
                            return Err(LlmError::Cancelled);
                        }
                        if !text.is_empty() {
                            on_token(&text, false)?;
                        }
                        if finished {
                            on_token("", true)?;
                            return Ok(());
                        }
                    }
                    SseItem::Done => {
                        on_token("", true)?;
                        return Ok(());
                    }
                }
            }
        }
        debug!(endpoint = %self.endpoint, "Stream ended without a terminal event");
        on_token("", true)
    }
}

/// Splits a byte stream into complete lines.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum SseItem {
    Skip,
    Token { text: String, finished: bool },
    Done,
}

pub(crate) fn parse_sse_line(line: &str) -> Result<SseItem, LlmError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseItem::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseItem::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseItem::Done);
    }
    let parsed: ChatResponse = serde_json::from_str(payload)
        .map_err(|e| LlmError::Decode(format!("{} (chunk: {})", e, snippet(payload))))?;
    let Some(choice) = parsed.choices.into_iter().next() else {
        return Ok(SseItem::Skip);
    };
    let text = choice
        .delta
        .or(choice.message)
        .and_then(|d| d.content)
        .unwrap_or_default();
    Ok(SseItem::Token { text, finished: choice.finish_reason.is_some() })
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
