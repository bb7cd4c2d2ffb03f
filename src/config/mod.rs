// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading.
//!
//! Precedence: defaults < TOML file (`LLAMACPP_CONFIG`) < environment.
//! Command-line flags are applied on top by the binary through
//! [`Config::apply`]. File keys are the environment variable names in
//! lower case, plus the short aliases in [`FILE_ALIASES`].

mod config_types;
mod parse;

use std::path::PathBuf;

pub use config_types::*;
pub use parse::{parse_addr, parse_duration};

use parse::{parse_bool, parse_buckets, parse_log_format, parse_usize};

/// Every recognised environment variable.
pub const ENV_VARS: &[&str] = &[
    "LLAMACPP_BASE_URL",
    "LLAMACPP_MODEL",
    "LLAMACPP_EXPORTER_ADDR",
    "LLAMACPP_SCRAPE_INTERVAL",
    "LLAMACPP_CLIENT_TIMEOUT",
    "LLAMACPP_BATCH_BUCKETS",
    "MODEL_RUNNER_URL",
    "RAG_API_ADDR",
    "VECTOR_DB_URL",
    "UPLOAD_DIR",
    "LLM_MODEL",
    "LLM_TIMEOUT",
    "CHUNK_SIZE",
    "CHUNK_OVERLAP",
    "OTEL_EXPORTER_OTLP_ENDPOINT",
    "OTEL_SERVICE_NAME",
    "TRACING_ENABLED",
    "SHUTDOWN_TIMEOUT",
    "LOG_FORMAT",
];

/// Short file keys accepted in addition to lower-cased variable names.
pub const FILE_ALIASES: &[(&str, &str)] = &[
    ("base_url", "LLAMACPP_BASE_URL"),
    ("model", "LLAMACPP_MODEL"),
    ("exporter_addr", "LLAMACPP_EXPORTER_ADDR"),
    ("scrape_interval", "LLAMACPP_SCRAPE_INTERVAL"),
    ("client_timeout", "LLAMACPP_CLIENT_TIMEOUT"),
    ("batch_buckets", "LLAMACPP_BATCH_BUCKETS"),
];

/// Load configuration from the process environment.
pub fn load() -> Result<Config, ConfigError> {
    load_from(|var| std::env::var(var).ok())
}

/// Load configuration from an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = lookup("LLAMACPP_CONFIG").filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_toml(&text)?;
    }

    for var in ENV_VARS {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            config.apply(var, &value)?;
        }
    }

    config.validate()?;
    Ok(config)
}

impl Config {
    /// Set one value by its environment variable name.
    pub fn apply(&mut self, var: &str, value: &str) -> Result<(), ConfigError> {
        match var {
            "LLAMACPP_BASE_URL" => self.engine.base_url = trim_url(value),
            "LLAMACPP_MODEL" => self.engine.model_label = value.trim().to_string(),
            "LLAMACPP_EXPORTER_ADDR" => self.exporter_addr = parse_addr(var, value)?,
            "LLAMACPP_SCRAPE_INTERVAL" => self.scrape.interval = parse_duration(var, value)?,
            "LLAMACPP_CLIENT_TIMEOUT" => self.engine.client_timeout = parse_duration(var, value)?,
            "LLAMACPP_BATCH_BUCKETS" => self.scrape.batch_buckets = parse_buckets(var, value)?,
            "MODEL_RUNNER_URL" => self.engine.model_runner_url = Some(trim_url(value)),
            "RAG_API_ADDR" => self.rag.addr = parse_addr(var, value)?,
            "VECTOR_DB_URL" => self.rag.vector_db_url = trim_url(value),
            "UPLOAD_DIR" => self.rag.upload_dir = PathBuf::from(value.trim()),
            "LLM_MODEL" => self.rag.llm_model = Some(value.trim().to_string()),
            "LLM_TIMEOUT" => self.rag.llm_timeout = parse_duration(var, value)?,
            "CHUNK_SIZE" => self.rag.chunk_size = parse_usize(var, value)?,
            "CHUNK_OVERLAP" => self.rag.chunk_overlap = parse_usize(var, value)?,
            "OTEL_EXPORTER_OTLP_ENDPOINT" => self.tracing.endpoint = trim_url(value),
            "OTEL_SERVICE_NAME" => self.tracing.service_name = value.trim().to_string(),
            "TRACING_ENABLED" => self.tracing.enabled = parse_bool(var, value)?,
            "SHUTDOWN_TIMEOUT" => self.shutdown_timeout = parse_duration(var, value)?,
            "LOG_FORMAT" => self.log_format = parse_log_format(var, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Overlay values from a TOML document.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let table: toml::Table = text.parse()?;
        for (key, value) in &table {
            let var = FILE_ALIASES
                .iter()
                .find(|(alias, _)| alias == key)
                .map(|(_, var)| (*var).to_string())
                .unwrap_or_else(|| key.to_ascii_uppercase());
            if !ENV_VARS.contains(&var.as_str()) {
                return Err(ConfigError::UnknownKey(key.clone()));
            }
            let raw = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.apply(&var, &raw)?;
        }
        Ok(())
    }

    /// Cross-field checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.model_label.is_empty() {
            return Err(ConfigError::invalid("LLAMACPP_MODEL", "model label must not be empty"));
        }
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::invalid("CHUNK_SIZE", "must be > 0"));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::invalid(
                "CHUNK_OVERLAP",
                format!("must be < CHUNK_SIZE ({})", self.rag.chunk_size),
            ));
        }
        Ok(())
    }
}

fn trim_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
