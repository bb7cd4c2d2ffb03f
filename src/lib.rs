// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! llamacpp-observer - observation agent for a locally hosted llama.cpp engine.
//!
//! Two halves share one process:
//! - the observation core: stats scraping, a labeled metric registry with
//!   text exposition, OTLP span export and a per-request inference monitor;
//! - the RAG pipeline: ingest, chunk, store, retrieve, augment and stream.

pub mod api;
pub mod config;
pub mod error;
pub mod exposition;
pub mod metrics;
pub mod monitor;
pub mod rag;
pub mod scrape;
pub mod shutdown;
pub mod stats;
pub mod telemetry;
pub mod tracer;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::ErrorKind;
pub use metrics::MetricRegistry;
pub use monitor::InferenceMonitor;
pub use scrape::ScrapeLoop;
pub use stats::{StatsClient, StatsSnapshot};
pub use tracer::Tracer;
