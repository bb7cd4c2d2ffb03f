// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed view of the engine's `/stats` payload.

use serde::{Deserialize, Serialize};

/// Engine run state as reported by `system.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineStatus {
    #[default]
    Unknown,
    Idle,
    Loading,
    Running,
}

impl EngineStatus {
    /// Any unrecognised label maps to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "idle" => EngineStatus::Idle,
            "loading" => EngineStatus::Loading,
            "running" => EngineStatus::Running,
            _ => EngineStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Unknown => "unknown",
            EngineStatus::Idle => "idle",
            EngineStatus::Loading => "loading",
            EngineStatus::Running => "running",
        }
    }

    /// Numeric encoding exported as `llamacpp_status`.
    pub fn code(&self) -> u8 {
        match self {
            EngineStatus::Unknown => 0,
            EngineStatus::Idle => 1,
            EngineStatus::Loading => 2,
            EngineStatus::Running => 3,
        }
    }
}

impl From<String> for EngineStatus {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<EngineStatus> for String {
    fn from(status: EngineStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub kv_cache_bytes: u64,
    pub kv_cache_max_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceStats {
    pub tokens_per_second: f64,
    #[serde(rename = "cpu_utilization")]
    pub cpu_util_pct: f64,
    #[serde(rename = "gpu_utilization", skip_serializing_if = "Option::is_none")]
    pub gpu_util_pct: Option<f64>,
    #[serde(rename = "temperature", skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelStats {
    pub name: String,
    pub size_bytes: u64,
    pub parameters: u64,
    pub context_size: u64,
    pub max_context_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchStats {
    pub size: u64,
    pub optimal_size: u64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    #[serde(rename = "threads")]
    pub thread_count: u64,
    pub status: EngineStatus,
}

/// One decoded `/stats` response. Built anew on every scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSnapshot {
    pub memory: MemoryStats,
    pub performance: PerformanceStats,
    pub model: ModelStats,
    pub batch: BatchStats,
    pub system: SystemStats,
}

impl StatsSnapshot {
    /// Invariant violations present in this snapshot.
    ///
    /// These are reported, never rejected: anomalous values still reach
    /// the registry so they stay visible in history.
    pub fn anomalies(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if self.memory.used_bytes > self.memory.total_bytes {
            found.push("memory.used_bytes > memory.total_bytes");
        }
        if self.memory.kv_cache_bytes > self.memory.kv_cache_max_bytes {
            found.push("memory.kv_cache_bytes > memory.kv_cache_max_bytes");
        }
        if self.model.context_size > self.model.max_context_size {
            found.push("model.context_size > model.max_context_size");
        }
        found
    }

    /// Batch latency converted to seconds.
    pub fn batch_latency_secs(&self) -> f64 {
        self.batch.latency_ms / 1000.0
    }

    /// KV cache fill ratio, or `None` when the limit is unknown.
    pub fn kv_cache_utilization(&self) -> Option<f64> {
        (self.memory.kv_cache_max_bytes > 0)
            .then(|| self.memory.kv_cache_bytes as f64 / self.memory.kv_cache_max_bytes as f64)
    }
}
