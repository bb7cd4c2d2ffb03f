// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric registry and text exposition.

pub mod catalogue;
mod histogram;
mod registry;
mod render;

pub use catalogue::{MetricDesc, MetricKind};
pub use histogram::HistogramSnapshot;
pub use registry::{MetricRegistry, RegistryError};
pub use render::CONTENT_TYPE;
