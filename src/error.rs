// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Abstract error taxonomy shared by every component.
//!
//! Concrete errors live next to the code that raises them; each one maps
//! onto an [`ErrorKind`] so request handlers and the inference monitor can
//! classify failures without knowing the concrete type.

use serde::Serialize;

/// Error classification used for HTTP status mapping and error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    BadStatus,
    Decode,
    Validation,
    UnsupportedType,
    Retrieval,
    EmbeddingStore,
    Inference,
    Io,
    Cancelled,
}

impl ErrorKind {
    /// Label value used by `llamacpp_errors_total{kind=...}`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::BadStatus => "bad_status",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::Retrieval => "retrieval_error",
            ErrorKind::EmbeddingStore => "embedding_store_error",
            ErrorKind::Inference => "inference_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether the failure originates from the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Decode | ErrorKind::UnsupportedType
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that knows its [`ErrorKind`].
pub trait Classify: std::fmt::Display {
    fn error_kind(&self) -> ErrorKind;
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 256;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
