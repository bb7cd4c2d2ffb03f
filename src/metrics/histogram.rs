// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-bucket histogram accumulator.

use std::sync::Arc;

/// Per-series histogram state. Bucket counts are stored non-cumulative;
/// the final slot counts observations above every bound (`+Inf` only).
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds: Arc<[f64]>,
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

/// Read-only copy of a histogram with cumulative bucket counts.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper_bound, cumulative_count)`, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

impl Histogram {
    pub fn new(bounds: Arc<[f64]>) -> Self {
        let slots = bounds.len() + 1;
        Self { bounds, counts: vec![0; slots], sum: 0.0, count: 0 }
    }

    pub fn observe(&mut self, value: f64) {
        let slot = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len());
        self.counts[slot] += 1;
        self.sum += value;
        self.count += 1;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut running = 0;
        let buckets = self
            .bounds
            .iter()
            .zip(&self.counts)
            .map(|(bound, n)| {
                running += n;
                (*bound, running)
            })
            .collect();
        HistogramSnapshot { buckets, sum: self.sum, count: self.count }
    }
}
