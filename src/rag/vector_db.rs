// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vector database client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Chunk, ChunkRecord};
use crate::error::{snippet, ErrorKind};

pub const POINTS_PATH: &str = "/api/collections/documents/points";
pub const QUERY_PATH: &str = "/api/collections/documents/query";

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Failed to store chunk {index}: {detail}")]
    Store { index: usize, status: Option<u16>, detail: String },

    #[error("Vector DB query failed: {detail}")]
    Query { status: Option<u16>, detail: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl VectorStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorStoreError::Store { .. } => ErrorKind::EmbeddingStore,
            VectorStoreError::Query { .. } => ErrorKind::Retrieval,
            VectorStoreError::Client(_) => ErrorKind::Network,
        }
    }
}

/// Storage and top-k lookup of chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store one chunk; `index` is its zero-based position for error reports.
    async fn store(&self, index: usize, record: &ChunkRecord<'_>) -> Result<(), VectorStoreError>;

    async fn query(&self, query_text: &str, n_results: usize) -> Result<Vec<Chunk>, VectorStoreError>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_text: &'a str,
    n_results: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Chunk>,
}

/// JSON-over-HTTP vector DB.
#[derive(Debug, Clone)]
pub struct HttpVectorStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, VectorStoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VectorStoreError::Client(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn store(&self, index: usize, record: &ChunkRecord<'_>) -> Result<(), VectorStoreError> {
        let url = format!("{}{}", self.base_url, POINTS_PATH);
        let store_err = |status: Option<u16>, detail: String| VectorStoreError::Store { index, status, detail };

        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| store_err(None, e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(store_err(
            Some(status.as_u16()),
            format!("status: {}, body: {}", status.as_u16(), snippet(&body)),
        ))
    }

    async fn query(&self, query_text: &str, n_results: usize) -> Result<Vec<Chunk>, VectorStoreError> {
        let url = format!("{}{}", self.base_url, QUERY_PATH);
        let query_err = |status: Option<u16>, detail: String| VectorStoreError::Query { status, detail };

        let response = self
            .http
            .post(&url)
            .json(&QueryRequest { query_text, n_results })
            .send()
            .await
            .map_err(|e| query_err(None, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(query_err(
                Some(status.as_u16()),
                format!("status: {}, body: {}", status.as_u16(), snippet(&body)),
            ));
        }
        let body = response.bytes().await.map_err(|e| query_err(None, e.to_string()))?;
        let parsed: QueryResponse = serde_json::from_slice(&body)
            .map_err(|e| query_err(None, format!("failed to decode response: {}", e)))?;
        Ok(parsed.results)
    }
}
