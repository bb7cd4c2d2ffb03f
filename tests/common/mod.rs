// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process fakes for the engine, the vector DB and the LLM.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const ENGINE_STATS: &str = r#"{"memory":{"used_bytes":1024,"total_bytes":4096,"kv_cache_bytes":256,"kv_cache_max_bytes":1024},"performance":{"tokens_per_second":42.5,"cpu_utilization":75.0},"model":{"name":"m","size_bytes":100,"parameters":7,"context_size":128,"max_context_size":2048},"batch":{"size":8,"optimal_size":16,"latency_ms":5},"system":{"threads":4,"status":"running"}}"#;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Engine whose `/stats` replays `script`; the last entry repeats.
pub async fn scripted_engine(script: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = (Arc::new(script), calls.clone());
    let router = Router::new()
        .route(
            "/stats",
            get(|State((script, calls)): State<(Arc<Vec<(u16, String)>>, Arc<AtomicUsize>)>| async move {
                let i = calls.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
                let (status, body) = script[i].clone();
                (StatusCode::from_u16(status).unwrap(), body)
            }),
        )
        .with_state(state);
    (spawn_router(router).await, calls)
}

/// Vector DB recording every stored point and answering queries with
/// one chunk per entry of `sources`.
pub async fn vector_db(sources: &[&str]) -> (String, Arc<Mutex<Vec<Value>>>) {
    let stored = Arc::new(Mutex::new(Vec::new()));
    let results: Vec<Value> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            json!({
                "id": format!("c{}", i),
                "text": format!("passage {} from {}", i, s),
                "metadata": {"source": s, "chunk_number": i, "total_chunks": sources.len()},
            })
        })
        .collect();
    let results = Arc::new(results);

    let points = stored.clone();
    let router = Router::new()
        .route(
            "/api/collections/documents/points",
            post(move |Json(body): Json<Value>| {
                let points = points.clone();
                async move {
                    points.lock().push(body);
                    StatusCode::CREATED
                }
            }),
        )
        .route(
            "/api/collections/documents/query",
            post(move |Json(body): Json<Value>| {
                let results = results.clone();
                async move {
                    let n = body["n_results"].as_u64().unwrap_or(5) as usize;
                    Json(json!({ "results": results.iter().take(n).cloned().collect::<Vec<_>>() }))
                }
            }),
        );
    (spawn_router(router).await, stored)
}

/// OpenAI-compatible LLM streaming `tokens`, one SSE frame each.
pub async fn llm(tokens: &[&str]) -> String {
    let tokens: Arc<Vec<String>> = Arc::new(tokens.iter().map(|t| t.to_string()).collect());
    let router = Router::new().route(
        "/chat/completions",
        post(move |Json(req): Json<Value>| {
            let tokens = tokens.clone();
            async move {
                if req["stream"].as_bool() == Some(true) {
                    let mut body = String::new();
                    for t in tokens.iter() {
                        let frame = json!({"choices":[{"delta":{"content":t},"finish_reason":null}]});
                        body.push_str(&format!("data: {}\n\n", frame));
                    }
                    body.push_str("data: [DONE]\n\n");
                    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
                } else {
                    Json(json!({"choices":[{"message":{"role":"assistant","content":tokens.concat()}}]}))
                        .into_response()
                }
            }
        }),
    );
    spawn_router(router).await
}
