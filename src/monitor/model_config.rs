// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model identity fetched from the engine's `/info` endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::{snippet, ErrorKind};

/// Labels attached to inference spans and per-request series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub size: String,
    pub quantization: String,
    pub context_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            size: "unknown".to_string(),
            quantization: "unknown".to_string(),
            context_size: 4096,
        }
    }
}

impl ModelConfig {
    /// Replace empty strings with `unknown` so labels are never empty.
    fn normalized(mut self) -> Self {
        for field in [&mut self.name, &mut self.size, &mut self.quantization] {
            if field.trim().is_empty() {
                *field = "unknown".to_string();
            }
        }
        if self.context_size == 0 {
            self.context_size = 4096;
        }
        self
    }
}

#[derive(Error, Debug)]
pub enum ModelInfoError {
    #[error("Failed to fetch model info: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Received non-OK status from model info endpoint: {0}")]
    BadStatus(u16),

    #[error("Failed to parse model info: {0}")]
    Decode(String),
}

impl ModelInfoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelInfoError::Network(_) => ErrorKind::Network,
            ModelInfoError::BadStatus(_) => ErrorKind::BadStatus,
            ModelInfoError::Decode(_) => ErrorKind::Decode,
        }
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    model_info: ModelConfig,
}

/// GET `<endpoint>/info`.
pub async fn fetch_model_config(
    http: &reqwest::Client,
    endpoint: &str,
) -> Result<ModelConfig, ModelInfoError> {
    let url = format!("{}/info", endpoint.trim_end_matches('/'));
    let response = http.get(&url).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(ModelInfoError::BadStatus(status.as_u16()));
    }
    let body = response.bytes().await?;
    let info: InfoResponse = serde_json::from_slice(&body).map_err(|e| {
        ModelInfoError::Decode(format!("{} (body: {})", e, snippet(&String::from_utf8_lossy(&body))))
    })?;
    Ok(info.model_info.normalized())
}

/// Fetch the model config, falling back to defaults on any failure.
pub async fn load_model_config(http: &reqwest::Client, endpoint: &str) -> ModelConfig {
    match fetch_model_config(http, endpoint).await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, kind = %e.kind(), "Failed to fetch model configuration, using defaults");
            ModelConfig::default()
        }
    }
}
