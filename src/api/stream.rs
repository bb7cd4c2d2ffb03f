// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Server-sent-event streaming of RAG answers.
//!
//! Generation runs on its own task and feeds an unbounded channel; the
//! response body drains it. Dropping the body (client gone) cancels the
//! generation through a drop guard.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, Extensions, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, error, info};

use super::handlers::{note_failure, validate_query, QueryRequest};
use super::{ApiError, AppState};
use crate::monitor;
use crate::rag::{RagError, RagEvent};

/// Lifecycle of one streaming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Init,
    SourcesSent,
    TokenStreaming,
    Done,
    Cancelled,
    Errored,
}

/// Input to [`StreamState::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Sources,
    Token { done: bool },
    Cancel,
    Fail,
}

impl From<&RagEvent> for Transition {
    fn from(event: &RagEvent) -> Self {
        match event {
            RagEvent::Sources { .. } => Transition::Sources,
            RagEvent::Token { done, .. } => Transition::Token { done: *done },
        }
    }
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Done | StreamState::Cancelled | StreamState::Errored)
    }

    /// Terminal states absorb every transition; out-of-order events leave
    /// the state unchanged.
    pub fn next(self, transition: Transition) -> StreamState {
        use StreamState::*;
        if self.is_terminal() {
            return self;
        }
        match (self, transition) {
            (_, Transition::Cancel) => Cancelled,
            (_, Transition::Fail) => Errored,
            (Init, Transition::Sources) => SourcesSent,
            (SourcesSent | TokenStreaming, Transition::Token { done: true }) => Done,
            (SourcesSent | TokenStreaming, Transition::Token { done: false }) => TokenStreaming,
            (state, _) => state,
        }
    }
}

type Frame = Result<RagEvent, RagError>;

struct Body {
    pending: Option<RagEvent>,
    rx: mpsc::UnboundedReceiver<Frame>,
    state: StreamState,
    _cancel_on_drop: DropGuard,
}

pub(super) async fn stream_query(
    State(state): State<AppState>,
    extensions: Extensions,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let query = validate_query(payload)?;
    let rag = state.orchestrator_for(&extensions);
    let monitor = monitor::from_extensions(&extensions);
    let cancel = state.cancel.child_token();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let events = tx.clone();
        let result = rag
            .query_streaming(&task_cancel, &query, move |event| {
                events.send(Ok(event)).map_err(|_| RagError::Cancelled)
            })
            .await;
        match result {
            Ok(()) => debug!("Streaming query completed"),
            Err(RagError::Cancelled) => info!("Streaming query cancelled"),
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Streaming query failed");
                if let RagError::Retrieve(_) = e {
                    note_failure(monitor.as_deref(), e.kind());
                }
                let _ = tx.send(Err(e));
            }
        }
    });

    // Failures before the first event still get a proper status code.
    let first = match rx.recv().await {
        Some(Ok(event)) => event,
        Some(Err(e)) => return Err(e.into()),
        None => return Err(RagError::Cancelled.into()),
    };

    let body = Body {
        pending: Some(first),
        rx,
        state: StreamState::Init,
        _cancel_on_drop: cancel.drop_guard(),
    };
    let events = stream::unfold(body, |mut body| async move {
        if body.state.is_terminal() {
            return None;
        }
        let frame = match body.pending.take() {
            Some(event) => Some(Ok(event)),
            None => body.rx.recv().await,
        };
        match frame {
            Some(Ok(event)) => {
                body.state = body.state.next(Transition::from(&event));
                Some((Event::default().json_data(&event), body))
            }
            Some(Err(_)) => {
                body.state = body.state.next(Transition::Fail);
                debug!(state = ?body.state, "Stream truncated");
                None
            }
            None => {
                body.state = body.state.next(Transition::Cancel);
                debug!(state = ?body.state, "Stream closed");
                None
            }
        }
    });

    let mut response = Sse::new(events).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}
