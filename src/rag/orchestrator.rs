// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Retrieval-augmented query execution.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::llm::{LlmClient, LlmError};
use super::prompt::{build_prompt, extract_sources};
use super::retriever::{RetrieveError, Retriever};
use super::types::Chunk;
use crate::error::{Classify, ErrorKind};

/// Chunks retrieved per query.
pub const CONTEXT_CHUNKS: i64 = 3;

#[derive(Error, Debug)]
pub enum RagError {
    #[error(transparent)]
    Retrieve(RetrieveError),

    #[error(transparent)]
    Llm(LlmError),

    #[error("Query cancelled")]
    Cancelled,
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Retrieve(e) => e.kind(),
            RagError::Llm(e) => e.kind(),
            RagError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl Classify for RagError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

impl From<RetrieveError> for RagError {
    fn from(e: RetrieveError) -> Self {
        match e {
            RetrieveError::Cancelled => RagError::Cancelled,
            other => RagError::Retrieve(other),
        }
    }
}

impl From<LlmError> for RagError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Cancelled => RagError::Cancelled,
            other => RagError::Llm(other),
        }
    }
}

/// One event of a streaming query, serialized as the SSE payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RagEvent {
    Sources { sources: Vec<String> },
    Token { text: String, done: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

#[derive(Clone)]
pub struct RagOrchestrator {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
}

impl RagOrchestrator {
    pub fn new(retriever: Retriever, llm: Arc<dyn LlmClient>) -> Self {
        Self { retriever, llm }
    }

    /// Same retriever, different LLM backend.
    pub fn with_llm(&self, llm: Arc<dyn LlmClient>) -> Self {
        Self { retriever: self.retriever.clone(), llm }
    }

    pub fn llm(&self) -> Arc<dyn LlmClient> {
        self.llm.clone()
    }

    async fn augment(&self, cancel: &CancellationToken, query: &str) -> Result<(String, Vec<String>), RagError> {
        let chunks = self.retriever.query(cancel, query, CONTEXT_CHUNKS).await?;
        let sources = extract_sources(&chunks);
        log_context(query, &chunks, &sources);
        Ok((build_prompt(query, &chunks), sources))
    }

    pub async fn query_blocking(&self, cancel: &CancellationToken, query: &str) -> Result<QueryAnswer, RagError> {
        let (prompt, sources) = self.augment(cancel, query).await?;
        let answer = self.llm.generate_completion(cancel, &prompt).await?;
        Ok(QueryAnswer { answer, sources })
    }

    /// Emit `Sources` once, then each token in generation order.
    ///
    /// An error returned by `on_event` stops generation and is returned
    /// as is.
    pub async fn query_streaming<F>(
        &self,
        cancel: &CancellationToken,
        query: &str,
        mut on_event: F,
    ) -> Result<(), RagError>
    where
        F: FnMut(RagEvent) -> Result<(), RagError> + Send,
    {
        let (prompt, sources) = self.augment(cancel, query).await?;
        on_event(RagEvent::Sources { sources })?;

        let mut consumer_error: Option<RagError> = None;
        let mut forward = |text: &str, done: bool| -> Result<(), LlmError> {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            on_event(RagEvent::Token { text: text.to_string(), done }).map_err(|e| {
                let message = e.to_string();
                consumer_error = Some(e);
                LlmError::Callback(message)
            })
        };
        let result = self.llm.generate_stream(cancel, &prompt, &mut forward).await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(consumer_error.take().unwrap_or_else(|| e.into())),
        }
    }
}

fn log_context(query: &str, chunks: &[Chunk], sources: &[String]) {
    let chunk_ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    debug!(query = %query, chunk_ids = ?chunk_ids, sources = ?sources, "Retrieved context for query");
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
