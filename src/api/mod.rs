// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! RAG HTTP surface: upload, blocking query, SSE streaming query, health.

mod error;
mod handlers;
pub mod stream;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Extensions;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use handlers::{QueryRequest, MAX_UPLOAD_BYTES};
pub use stream::StreamState;

use crate::monitor::{self, InferenceMonitor, MonitoredLlm};
use crate::rag::{DocumentIngestor, RagOrchestrator};
use crate::shutdown::serve_until;

/// Multipart framing headroom on top of the file cap.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + (1 << 20);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<DocumentIngestor>,
    pub rag: RagOrchestrator,
    pub monitor: Option<Arc<InferenceMonitor>>,
    /// Parent of every per-request cancellation token.
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(ingestor: Arc<DocumentIngestor>, rag: RagOrchestrator, cancel: CancellationToken) -> Self {
        Self { ingestor, rag, monitor: None, cancel }
    }

    pub fn with_monitor(mut self, monitor: Arc<InferenceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Orchestrator whose LLM calls are traced by the request's monitor.
    fn orchestrator_for(&self, extensions: &Extensions) -> RagOrchestrator {
        let llm = MonitoredLlm::new(self.rag.llm(), monitor::from_extensions(extensions));
        self.rag.with_llm(Arc::new(llm))
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/documents/upload", post(handlers::upload))
        .route("/api/rag/query", post(handlers::query))
        .route("/api/rag/stream", post(stream::stream_query))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http());
    if let Some(monitor) = state.monitor.clone() {
        router = router.layer(middleware::from_fn_with_state(monitor, monitor::attach));
    }
    router.with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "RAG API listening");
    Ok(listener)
}

/// Serve the API until `cancel` fires. In-flight streams end with it.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> std::io::Result<()> {
    serve_until(listener, router(state), cancel).await
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
