// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Component wiring for the `serve` and `exporter` commands.

use std::error::Error;
use std::sync::Arc;

use tracing::{error, info, warn};

use llamacpp_observer::api::{self, AppState};
use llamacpp_observer::config::{self, Config, ConfigError};
use llamacpp_observer::exposition;
use llamacpp_observer::monitor::InferenceMonitor;
use llamacpp_observer::rag::{
    DocumentIngestor, HttpVectorStore, IngestSettings, OpenAiClient, PdfTextExtractor, RagOrchestrator, Retriever,
};
use llamacpp_observer::shutdown::{wait_for_signal, ShutdownCoordinator, ShutdownResult};
use llamacpp_observer::{MetricRegistry, ScrapeLoop, StatsClient, Tracer};

type BoxError = Box<dyn Error + Send + Sync>;

/// Environment and file configuration with command-line overrides on top.
pub fn load_config(overrides: &[(&'static str, String)]) -> Result<Config, ConfigError> {
    let mut config = config::load()?;
    for (var, value) in overrides {
        config.apply(var, value)?;
    }
    config.validate()?;
    Ok(config)
}

fn log_effective_config(config: &Config, command: &str) {
    info!(
        command,
        base_url = %config.engine.base_url,
        model = %config.engine.model_label,
        exporter_addr = %config.exporter_addr,
        scrape_interval = ?config.scrape.interval,
        client_timeout = ?config.engine.client_timeout,
        "Starting llamacpp-observer v{}",
        env!("CARGO_PKG_VERSION")
    );
}

fn scrape_loop(config: &Config, registry: &MetricRegistry) -> Result<ScrapeLoop, BoxError> {
    let client = StatsClient::new(config.engine.base_url.clone(), config.engine.client_timeout)?;
    Ok(ScrapeLoop::new(client, registry.clone(), config.engine.model_label.clone(), config.scrape.interval))
}

async fn start_exporter(config: &Config, registry: &MetricRegistry, shutdown: &ShutdownCoordinator) -> Result<(), BoxError> {
    let listener = exposition::bind(config.exporter_addr).await?;
    let registry = registry.clone();
    let token = shutdown.token();
    shutdown.spawn("exporter", async move {
        if let Err(e) = exposition::serve(listener, registry, token).await {
            error!(error = %e, "Metrics exporter failed");
        }
    });
    Ok(())
}

async fn drain(shutdown: &ShutdownCoordinator, config: &Config) {
    match shutdown.initiate(config.shutdown_timeout).await {
        ShutdownResult::Complete => info!("Shutdown complete"),
        ShutdownResult::Timeout { remaining } => {
            warn!(remaining, "Shutdown timeout, abandoning remaining tasks");
        }
    }
}

/// Metrics only: scrape loop plus `/metrics`.
pub async fn run_exporter(config: Config) -> Result<(), BoxError> {
    log_effective_config(&config, "exporter");
    let registry = MetricRegistry::new(config.scrape.batch_buckets);
    let shutdown = ShutdownCoordinator::new();

    let scrape = scrape_loop(&config, &registry)?;
    shutdown.spawn("scrape", scrape.run(shutdown.token()));
    start_exporter(&config, &registry, &shutdown).await?;

    wait_for_signal().await;
    info!("Shutdown signal received, draining...");
    drain(&shutdown, &config).await;
    Ok(())
}

/// Exporter, inference monitor, tracer and RAG API in one process.
pub async fn run_serve(config: Config) -> Result<(), BoxError> {
    log_effective_config(&config, "serve");
    info!(
        rag_addr = %config.rag.addr,
        vector_db = %config.rag.vector_db_url,
        upload_dir = %config.rag.upload_dir.display(),
        llm_model = %config.llm_model(),
        tracing_enabled = config.tracing.enabled,
        otlp_endpoint = %config.tracing.endpoint,
        "RAG and tracing configuration"
    );

    let registry = MetricRegistry::new(config.scrape.batch_buckets);
    let tracer = Tracer::new(&config.tracing)?;
    let shutdown = ShutdownCoordinator::new();

    let info_client = reqwest::Client::builder().timeout(config.engine.client_timeout).build()?;
    let monitor = Arc::new(
        InferenceMonitor::connect(&info_client, config.engine.info_endpoint(), registry.clone(), tracer.clone()).await,
    );
    monitor.start(scrape_loop(&config, &registry)?, &shutdown)?;
    start_exporter(&config, &registry, &shutdown).await?;

    let store = Arc::new(HttpVectorStore::new(config.rag.vector_db_url.clone(), config.rag.llm_timeout)?);
    let llm = Arc::new(OpenAiClient::new(&config.engine.base_url, config.llm_model(), config.rag.llm_timeout)?);
    let ingestor = DocumentIngestor::new(
        IngestSettings {
            upload_dir: config.rag.upload_dir.clone(),
            chunk_size: config.rag.chunk_size,
            chunk_overlap: config.rag.chunk_overlap,
        },
        Arc::new(PdfTextExtractor),
        store.clone(),
    );
    let rag = RagOrchestrator::new(Retriever::new(store), llm);
    let state = AppState::new(Arc::new(ingestor), rag, shutdown.token()).with_monitor(monitor.clone());

    let listener = api::bind(config.rag.addr).await?;
    let token = shutdown.token();
    shutdown.spawn("rag-api", async move {
        if let Err(e) = api::serve(listener, state, token).await {
            error!(error = %e, "RAG API failed");
        }
    });

    wait_for_signal().await;
    info!("Shutdown signal received, draining...");
    monitor.stop();
    drain(&shutdown, &config).await;
    tracer.shutdown(config.shutdown_timeout).await;
    Ok(())
}
