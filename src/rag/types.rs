// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Documents, chunks and their metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-chunk provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub chunk_number: usize,
    pub total_chunks: usize,
}

/// A slice of a document as stored in and returned by the vector DB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunk {
    pub id: String,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
}

/// Supported upload types, keyed by lower-case extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Pdf,
    Text,
}

impl DocumentType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "txt" => Some(DocumentType::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Text => "txt",
        }
    }
}

/// An ingested document. Lives only until the upload response is sent.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub doc_type: DocumentType,
    pub page_count: Option<u32>,
    pub chunks: Vec<Chunk>,
}

/// Record POSTed to the vector DB for each chunk.
#[derive(Debug, Serialize)]
pub struct ChunkRecord<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub metadata: &'a Metadata,
    pub document_id: String,
}

impl<'a> ChunkRecord<'a> {
    pub fn new(chunk: &'a Chunk, document_id: Uuid) -> Self {
        Self {
            id: &chunk.id,
            text: &chunk.content,
            metadata: &chunk.metadata,
            document_id: document_id.to_string(),
        }
    }
}
