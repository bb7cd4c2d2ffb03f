// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

use axum::extract::multipart::{Field, Multipart};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::Extensions;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::error::ErrorKind;
use crate::monitor::{self, InferenceMonitor};
use crate::rag::{IngestError, QueryAnswer, RagError, Upload};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
pub(super) struct UploadResponse {
    success: bool,
    message: &'static str,
    document: DocumentSummary,
}

#[derive(Serialize)]
struct DocumentSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    doc_type: &'static str,
    chunks_count: usize,
}

pub(super) async fn upload(
    State(state): State<AppState>,
    extensions: Extensions,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() == Some("file") {
            upload = Some(read_upload(field).await?);
            break;
        }
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    info!(file = %upload.file_name, bytes = upload.bytes.len(), "Upload received");

    let cancel = state.cancel.child_token();
    let document = state.ingestor.process(&cancel, upload).await.map_err(|e| {
        if let IngestError::Store(_) = e {
            note_failure(monitor::from_extensions(&extensions).as_deref(), e.kind());
        }
        ApiError::from(e)
    })?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Document processed successfully",
        document: DocumentSummary {
            id: document.id.to_string(),
            name: document.name,
            doc_type: document.doc_type.as_str(),
            chunks_count: document.chunks.len(),
        },
    }))
}

/// Read the file part, enforcing the content type and the size cap
/// before anything is staged.
async fn read_upload(mut field: Field<'_>) -> Result<Upload, ApiError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type_allowed(&content_type) {
        return Err(ApiError::bad_request(format!(
            "Unsupported content type {:?}; only PDF and text files are accepted",
            content_type
        )));
    }

    // Past the cap the rest of the part is drained, not buffered.
    let mut bytes = Vec::new();
    let mut oversized = false;
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if oversized || bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            oversized = true;
            continue;
        }
        bytes.extend_from_slice(&chunk);
    }
    if oversized {
        return Err(ApiError::bad_request(format!(
            "File too large (max {} MiB)",
            MAX_UPLOAD_BYTES >> 20
        )));
    }
    Ok(Upload { file_name, bytes })
}

pub(super) fn content_type_allowed(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) || essence.starts_with("text/")
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart upload: {}", e.body_text()))
}

pub(super) async fn query(
    State(state): State<AppState>,
    extensions: Extensions,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let query = validate_query(payload)?;
    let rag = state.orchestrator_for(&extensions);
    let cancel = state.cancel.child_token();
    let answer = rag.query_blocking(&cancel, &query).await.map_err(|e| {
        if let RagError::Retrieve(_) = e {
            note_failure(monitor::from_extensions(&extensions).as_deref(), e.kind());
        }
        ApiError::from(e)
    })?;
    Ok(Json(answer))
}

/// Decode `{query}` and reject blank queries.
pub(super) fn validate_query(payload: Result<Json<QueryRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query cannot be empty"));
    }
    Ok(request.query)
}

/// Count failures raised outside an inference trace.
pub(super) fn note_failure(monitor: Option<&InferenceMonitor>, kind: ErrorKind) {
    if let Some(monitor) = monitor {
        monitor.record_error(kind);
    }
}
