// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Snapshot to series mapping.

use crate::metrics::catalogue::*;
use crate::metrics::{MetricRegistry, RegistryError};
use crate::stats::StatsSnapshot;

/// Push one snapshot into the registry under `model`.
///
/// Latency is converted to seconds, status to its numeric code. GPU
/// utilisation and temperature are left untouched unless positive.
pub fn apply_snapshot(
    registry: &MetricRegistry,
    snapshot: &StatsSnapshot,
    model: &str,
) -> Result<(), RegistryError> {
    let labels = [model];
    let gauges = [
        (MEMORY_USAGE_BYTES, snapshot.memory.used_bytes as f64),
        (TOTAL_MEMORY_BYTES, snapshot.memory.total_bytes as f64),
        (TOKENS_PER_SECOND, snapshot.performance.tokens_per_second),
        (CPU_UTILIZATION_PERCENT, snapshot.performance.cpu_util_pct),
        (CONTEXT_SIZE_TOKENS, snapshot.model.context_size as f64),
        (MAX_CONTEXT_SIZE_TOKENS, snapshot.model.max_context_size as f64),
        (MODEL_SIZE_BYTES, snapshot.model.size_bytes as f64),
        (MODEL_PARAMETERS, snapshot.model.parameters as f64),
        (BATCH_SIZE, snapshot.batch.size as f64),
        (OPTIMAL_BATCH_SIZE, snapshot.batch.optimal_size as f64),
        (KV_CACHE_USAGE_BYTES, snapshot.memory.kv_cache_bytes as f64),
        (KV_CACHE_LIMIT_BYTES, snapshot.memory.kv_cache_max_bytes as f64),
        (THREAD_COUNT, snapshot.system.thread_count as f64),
        (STATUS, f64::from(snapshot.system.status.code())),
    ];
    for (name, value) in gauges {
        registry.set(name, &labels, value)?;
    }

    if let Some(gpu) = snapshot.performance.gpu_util_pct.filter(|v| *v > 0.0) {
        registry.set(GPU_UTILIZATION_PERCENT, &labels, gpu)?;
    }
    if let Some(temp) = snapshot.performance.temperature_c.filter(|v| *v > 0.0) {
        registry.set(TEMPERATURE_CELSIUS, &labels, temp)?;
    }

    registry.observe(BATCH_LATENCY_SECONDS, &labels, snapshot.batch_latency_secs())
}
