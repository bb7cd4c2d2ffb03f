// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Upload ingestion: stage, extract, chunk, store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::chunker::{chunk_text, validate_chunks, ChunkError};
use super::pdf::{ExtractError, PdfExtractor};
use super::types::{ChunkRecord, Document, DocumentType, Metadata};
use super::vector_db::{VectorStore, VectorStoreError};
use crate::error::{Classify, ErrorKind};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type: {0:?}")]
    UnsupportedType(String),

    #[error("Failed to stage upload at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Text file is not valid UTF-8: {0}")]
    InvalidText(String),

    #[error("Extraction task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Store(#[from] VectorStoreError),

    #[error("Ingestion cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            IngestError::Io { .. } | IngestError::Task(_) => ErrorKind::Io,
            IngestError::Extract(_) | IngestError::InvalidText(_) => ErrorKind::Decode,
            IngestError::Chunk(_) => ErrorKind::Validation,
            IngestError::Store(e) => e.kind(),
            IngestError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl Classify for IngestError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

/// One uploaded file, fully read into memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

pub struct DocumentIngestor {
    settings: IngestSettings,
    pdf: Arc<dyn PdfExtractor>,
    store: Arc<dyn VectorStore>,
}

impl DocumentIngestor {
    pub fn new(settings: IngestSettings, pdf: Arc<dyn PdfExtractor>, store: Arc<dyn VectorStore>) -> Self {
        Self { settings, pdf, store }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.settings.upload_dir
    }

    /// Run the whole pipeline for one upload.
    ///
    /// The first failed chunk store aborts the rest; chunks already stored
    /// are left in place.
    pub async fn process(&self, cancel: &CancellationToken, upload: Upload) -> Result<Document, IngestError> {
        let name = base_name(&upload.file_name);
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        self.ensure_upload_dir().await?;
        let id = Uuid::new_v4();
        let staged = self.stage(id, &ext, &upload.bytes).await?;
        info!(document_id = %id, file = %name, path = %staged.display(), "Upload staged");

        let doc_type = DocumentType::from_extension(&ext).ok_or_else(|| IngestError::UnsupportedType(ext.clone()))?;
        let (text, page_count) = match doc_type {
            DocumentType::Pdf => {
                let pdf = self.pdf.clone();
                let bytes = upload.bytes;
                let extracted = tokio::task::spawn_blocking(move || pdf.extract(&bytes))
                    .await
                    .map_err(|e| IngestError::Task(e.to_string()))??;
                (extracted.text, Some(extracted.page_count))
            }
            DocumentType::Text => {
                let text = String::from_utf8(upload.bytes).map_err(|e| IngestError::InvalidText(e.to_string()))?;
                (text, None)
            }
        };

        let base = Metadata { source: name.clone(), ..Default::default() };
        let chunks = chunk_text(&text, self.settings.chunk_size, self.settings.chunk_overlap, &base)?;
        validate_chunks(&chunks, self.settings.chunk_size)?;

        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            let record = ChunkRecord::new(chunk, id);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestError::Cancelled),
                result = self.store.store(index, &record) => result?,
            }
            debug!(document_id = %id, "Stored embedding for chunk {}/{}", index + 1, total);
        }

        info!(document_id = %id, file = %name, chunks = total, "Document processed");
        Ok(Document { id, name, doc_type, page_count, chunks })
    }

    async fn ensure_upload_dir(&self) -> Result<(), IngestError> {
        let dir = &self.settings.upload_dir;
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(dir).await.map_err(|source| IngestError::Io {
            path: dir.display().to_string(),
            source,
        })
    }

    async fn stage(&self, id: Uuid, ext: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        let file_name = if ext.is_empty() { id.to_string() } else { format!("{}.{}", id, ext) };
        let path = self.settings.upload_dir.join(file_name);
        tokio::fs::write(&path, bytes).await.map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}

/// Final path component of a client-supplied file name.
fn base_name(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim().to_string()
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
