// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe store of labeled gauges, counters and histograms.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use super::catalogue::{self, MetricDesc, MetricKind};
use super::histogram::{Histogram, HistogramSnapshot};
use crate::config::BucketSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Metric {name} is a {actual}, not a {expected}")]
    WrongKind { name: String, expected: &'static str, actual: &'static str },

    #[error("Metric {name} expects {expected} label values, got {actual}")]
    LabelMismatch { name: String, expected: usize, actual: usize },

    #[error("Metric {name} has an empty value for label {label}")]
    EmptyLabel { name: String, label: &'static str },

    #[error("Counter {name} cannot decrease (delta {delta})")]
    NegativeDelta { name: String, delta: f64 },
}

#[derive(Debug, Clone)]
pub(crate) enum SeriesValue {
    Scalar(f64),
    Histogram(Histogram),
}

pub(crate) struct Family {
    pub(crate) desc: MetricDesc,
    bounds: Arc<[f64]>,
    pub(crate) series: DashMap<Vec<String>, SeriesValue>,
}

impl Family {
    fn new(desc: MetricDesc) -> Self {
        let bounds: Arc<[f64]> = desc.buckets.clone().into();
        Self { desc, bounds, series: DashMap::new() }
    }

    fn fresh_value(&self) -> SeriesValue {
        match self.desc.kind {
            MetricKind::Histogram => SeriesValue::Histogram(Histogram::new(self.bounds.clone())),
            MetricKind::Gauge | MetricKind::Counter => SeriesValue::Scalar(0.0),
        }
    }

    fn key(&self, labels: &[&str]) -> Result<Vec<String>, RegistryError> {
        let expected = self.desc.label_names.len();
        if labels.len() != expected {
            return Err(RegistryError::LabelMismatch {
                name: self.desc.name.to_string(),
                expected,
                actual: labels.len(),
            });
        }
        if let Some(i) = labels.iter().position(|v| v.is_empty()) {
            return Err(RegistryError::EmptyLabel {
                name: self.desc.name.to_string(),
                label: self.desc.label_names[i],
            });
        }
        Ok(labels.iter().map(|v| v.to_string()).collect())
    }

    fn expect_kind(&self, expected: MetricKind) -> Result<(), RegistryError> {
        if self.desc.kind == expected {
            return Ok(());
        }
        Err(RegistryError::WrongKind {
            name: self.desc.name.to_string(),
            expected: expected.as_str(),
            actual: self.desc.kind.as_str(),
        })
    }

    /// Apply `f` to the series for `labels`, creating it on first use.
    /// Only the owning DashMap shard is locked while `f` runs.
    fn update(&self, labels: &[&str], f: impl FnOnce(&mut SeriesValue)) -> Result<(), RegistryError> {
        let key = self.key(labels)?;
        let mut entry = self.series.entry(key).or_insert_with(|| self.fresh_value());
        f(entry.value_mut());
        Ok(())
    }
}

/// Registry of every metric family the observer exports.
///
/// Families are fixed at construction; series within a family appear on
/// their first update. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct MetricRegistry {
    families: Arc<Vec<Family>>,
    index: Arc<HashMap<&'static str, usize>>,
}

impl MetricRegistry {
    /// Registry over the standard catalogue.
    pub fn new(batch_buckets: BucketSpec) -> Self {
        Self::with_catalogue(catalogue::standard(batch_buckets))
    }

    pub fn with_catalogue(descs: Vec<MetricDesc>) -> Self {
        let index = descs.iter().enumerate().map(|(i, d)| (d.name, i)).collect();
        let families = descs.into_iter().map(Family::new).collect();
        Self { families: Arc::new(families), index: Arc::new(index) }
    }

    fn family(&self, name: &str) -> Result<&Family, RegistryError> {
        self.index
            .get(name)
            .map(|i| &self.families[*i])
            .ok_or_else(|| RegistryError::UnknownMetric(name.to_string()))
    }

    pub(crate) fn families(&self) -> &[Family] {
        &self.families
    }

    /// Overwrite a gauge.
    pub fn set(&self, name: &str, labels: &[&str], value: f64) -> Result<(), RegistryError> {
        let family = self.family(name)?;
        family.expect_kind(MetricKind::Gauge)?;
        family.update(labels, |series| *series = SeriesValue::Scalar(value))
    }

    /// Add a non-negative delta to a counter.
    pub fn inc(&self, name: &str, labels: &[&str], delta: f64) -> Result<(), RegistryError> {
        let family = self.family(name)?;
        family.expect_kind(MetricKind::Counter)?;
        if delta < 0.0 || delta.is_nan() {
            return Err(RegistryError::NegativeDelta { name: name.to_string(), delta });
        }
        family.update(labels, |series| {
            if let SeriesValue::Scalar(v) = series {
                *v += delta;
            }
        })
    }

    /// Record one histogram observation.
    pub fn observe(&self, name: &str, labels: &[&str], value: f64) -> Result<(), RegistryError> {
        let family = self.family(name)?;
        family.expect_kind(MetricKind::Histogram)?;
        family.update(labels, |series| {
            if let SeriesValue::Histogram(h) = series {
                h.observe(value);
            }
        })
    }

    /// Current value of a gauge or counter series.
    pub fn value(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let family = self.family(name).ok()?;
        let key = family.key(labels).ok()?;
        match family.series.get(&key)?.value() {
            SeriesValue::Scalar(v) => Some(*v),
            SeriesValue::Histogram(_) => None,
        }
    }

    pub fn histogram(&self, name: &str, labels: &[&str]) -> Option<HistogramSnapshot> {
        let family = self.family(name).ok()?;
        let key = family.key(labels).ok()?;
        match family.series.get(&key)?.value() {
            SeriesValue::Histogram(h) => Some(h.snapshot()),
            SeriesValue::Scalar(_) => None,
        }
    }

    /// Number of live series across all families.
    pub fn series_count(&self) -> usize {
        self.families.iter().map(|f| f.series.len()).sum()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("families", &self.families.len())
            .field("series", &self.series_count())
            .finish()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(BucketSpec::default())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
