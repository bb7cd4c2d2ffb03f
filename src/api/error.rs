// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::ErrorKind;
use crate::rag::{IngestError, RagError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::Validation,
            ApiError::Ingest(e) => e.kind(),
            ApiError::Rag(e) => e.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        let kind = self.kind();
        if kind.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if kind == ErrorKind::Cancelled {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = %self.kind(), error = %self, "Request failed");
        } else {
            warn!(kind = %self.kind(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
