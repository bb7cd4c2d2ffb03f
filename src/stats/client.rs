// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-shot `/stats` fetcher. Retries belong to the caller.

use std::time::Duration;

use thiserror::Error;

use super::snapshot::StatsSnapshot;
use crate::error::{snippet, ErrorKind};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Failed to fetch stats: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status code from {url}: {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Failed to decode stats: {0}")]
    Decode(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl StatsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatsError::Network(_) | StatsError::Client(_) => ErrorKind::Network,
            StatsError::BadStatus { .. } => ErrorKind::BadStatus,
            StatsError::Decode(_) => ErrorKind::Decode,
        }
    }
}

/// HTTP client for the engine statistics endpoint.
#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    base_url: String,
}

impl StatsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StatsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StatsError::Client(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Reuse an existing client; its timeout applies.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats_url(&self) -> String {
        format!("{}/stats", self.base_url)
    }

    /// GET `<base>/stats` and decode it.
    pub async fn fetch(&self) -> Result<StatsSnapshot, StatsError> {
        let url = self.stats_url();
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::BadStatus { url, status: status.as_u16() });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            StatsError::Decode(format!("{} (body: {})", e, snippet(&String::from_utf8_lossy(&body))))
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
