// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration types and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue { var: var.to_string(), reason: reason.into() }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Linear histogram bucket layout: `count` upper bounds starting at
/// `start`, spaced `width` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSpec {
    pub start: f64,
    pub width: f64,
    pub count: usize,
}

impl Default for BucketSpec {
    fn default() -> Self {
        Self { start: 0.001, width: 0.005, count: 10 }
    }
}

/// Where the LLM engine lives and how it is labeled.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    /// Endpoint for `/info`; falls back to `base_url`.
    pub model_runner_url: Option<String>,
    /// Value of the `model` label on every scraped series.
    pub model_label: String,
    pub client_timeout: Duration,
}

impl EngineConfig {
    pub fn info_endpoint(&self) -> &str {
        self.model_runner_url.as_deref().unwrap_or(&self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub interval: Duration,
    pub batch_buckets: BucketSpec,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub addr: SocketAddr,
    pub vector_db_url: String,
    pub upload_dir: PathBuf,
    /// Model name sent to the completion API; falls back to the engine label.
    pub llm_model: Option<String>,
    pub llm_timeout: Duration,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub scrape: ScrapeConfig,
    pub exporter_addr: SocketAddr,
    pub tracing: TracingConfig,
    pub rag: RagConfig,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn llm_model(&self) -> &str {
        self.rag.llm_model.as_deref().unwrap_or(&self.engine.model_label)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                base_url: "http://model-runner.docker.internal/engines/llama.cpp/v1".to_string(),
                model_runner_url: None,
                model_label: "llama".to_string(),
                client_timeout: Duration::from_secs(3),
            },
            scrape: ScrapeConfig {
                interval: Duration::from_secs(5),
                batch_buckets: BucketSpec::default(),
            },
            exporter_addr: SocketAddr::from(([0, 0, 0, 0], 9100)),
            tracing: TracingConfig {
                enabled: true,
                endpoint: "http://jaeger:4318".to_string(),
                service_name: "llama-cpp-monitor".to_string(),
            },
            rag: RagConfig {
                addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
                vector_db_url: "http://vectordb:8000".to_string(),
                upload_dir: PathBuf::from("./uploads"),
                llm_model: None,
                llm_timeout: Duration::from_secs(120),
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            shutdown_timeout: Duration::from_secs(10),
            log_format: LogFormat::Text,
        }
    }
}
