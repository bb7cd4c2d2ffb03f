// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Periodic engine scrape: fetch `/stats`, push into the registry.

mod mapping;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub use mapping::apply_snapshot;

use crate::metrics::MetricRegistry;
use crate::stats::{StatsClient, StatsError, StatsSnapshot};

/// Latest successfully scraped snapshot, shared with the inference monitor.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<Option<StatsSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: StatsSnapshot) {
        *self.inner.write() = Some(snapshot);
    }

    pub fn latest(&self) -> Option<StatsSnapshot> {
        self.inner.read().clone()
    }
}

/// Tick outcome counters.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
}

/// Drives the stats client on a fixed cadence.
pub struct ScrapeLoop {
    client: StatsClient,
    registry: MetricRegistry,
    model: String,
    interval: Duration,
    latest: SnapshotCell,
    stats: Arc<ScrapeStats>,
}

impl ScrapeLoop {
    pub fn new(
        client: StatsClient,
        registry: MetricRegistry,
        model: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            model: model.into(),
            interval,
            latest: SnapshotCell::new(),
            stats: Arc::new(ScrapeStats::default()),
        }
    }

    /// Publish snapshots into an existing cell instead of a private one.
    pub fn with_snapshot_cell(mut self, cell: SnapshotCell) -> Self {
        self.latest = cell;
        self
    }

    pub fn snapshot_cell(&self) -> SnapshotCell {
        self.latest.clone()
    }

    pub fn stats(&self) -> Arc<ScrapeStats> {
        self.stats.clone()
    }

    /// One fetch and update. Errors are returned, not logged.
    pub async fn scrape_once(&self) -> Result<(), StatsError> {
        let snapshot = self.client.fetch().await?;
        for anomaly in snapshot.anomalies() {
            warn!(model = %self.model, anomaly, "Stats snapshot violates invariant");
        }
        if let Err(e) = apply_snapshot(&self.registry, &snapshot, &self.model) {
            error!(error = %e, "Failed to update metric registry");
        }
        self.latest.publish(snapshot);
        Ok(())
    }

    /// Tick until `cancel` fires. The first tick is immediate.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.scrape_once() => result,
            };
            match result {
                Ok(()) => {
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    debug!(model = %self.model, "Scrape complete");
                }
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, kind = %e.kind(), url = %self.client.stats_url(), "Error collecting metrics");
                }
            }
        }
        debug!("Scrape loop stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
#[path = "scrape_tests.rs"]
mod tests;
