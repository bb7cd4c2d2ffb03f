// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for unit tests: in-process fake HTTP collaborators.

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::rag::llm::{LlmClient, LlmError};
use crate::rag::types::{Chunk, ChunkRecord, Metadata};
use crate::rag::vector_db::{VectorStore, VectorStoreError};

/// Engine `/stats` payload used across tests.
pub(crate) const SAMPLE_STATS: &str = r#"{"memory":{"used_bytes":1024,"total_bytes":4096,"kv_cache_bytes":256,"kv_cache_max_bytes":1024},"performance":{"tokens_per_second":42.5,"cpu_utilization":75.0},"model":{"name":"m","size_bytes":100,"parameters":7,"context_size":128,"max_context_size":2048},"batch":{"size":8,"optimal_size":16,"latency_ms":5},"system":{"threads":4,"status":"running"}}"#;

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Vector store returning a fixed result set for every query.
#[derive(Default)]
pub(crate) struct FixedStore {
    pub chunks: Vec<Chunk>,
}

impl FixedStore {
    pub fn with_sources(sources: &[&str]) -> Self {
        let chunks = sources
            .iter()
            .enumerate()
            .map(|(i, s)| Chunk {
                id: format!("chunk-{}", i),
                content: format!("content {}", i),
                embedding: None,
                metadata: Metadata { source: s.to_string(), chunk_number: i, total_chunks: sources.len(), ..Default::default() },
            })
            .collect();
        Self { chunks }
    }
}

#[async_trait]
impl VectorStore for FixedStore {
    async fn store(&self, _: usize, _: &ChunkRecord<'_>) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn query(&self, _: &str, n: usize) -> Result<Vec<Chunk>, VectorStoreError> {
        Ok(self.chunks.iter().take(n).cloned().collect())
    }
}

/// LLM emitting a fixed token script and recording prompts it was given.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    pub tokens: Vec<String>,
    pub fail_after: Option<usize>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(tokens: &[&str]) -> Self {
        Self { tokens: tokens.iter().map(|t| t.to_string()).collect(), ..Default::default() }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate_completion(&self, cancel: &CancellationToken, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        if self.fail_after.is_some() {
            return Err(LlmError::BadStatus { status: 500, body: "engine crashed".to_string() });
        }
        Ok(self.tokens.concat())
    }

    async fn generate_stream(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str, bool) -> Result<(), LlmError> + Send),
    ) -> Result<(), LlmError> {
        self.prompts.lock().push(prompt.to_string());
        for (i, token) in self.tokens.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(LlmError::BadStatus { status: 500, body: "engine crashed".to_string() });
            }
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            on_token(token, false)?;
            tokio::task::yield_now().await;
        }
        on_token("", true)
    }
}
