// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pull endpoint serving the metric registry at `/metrics`.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::metrics::{MetricRegistry, CONTENT_TYPE};
use crate::shutdown::serve_until;

/// Per-request handler budget. Socket reads and writes are not bounded.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn router(registry: MetricRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<MetricRegistry>) -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], registry.render())
}

/// Bind the exporter address. Failure here is fatal at startup.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics exporter listening");
    Ok(listener)
}

/// Serve `/metrics` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    registry: MetricRegistry,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    serve_until(listener, router(registry), cancel).await
}
