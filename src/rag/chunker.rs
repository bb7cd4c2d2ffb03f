// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-size character chunking with overlap.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use super::types::{Chunk, Metadata};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid chunking parameters: size {size}, overlap {overlap}")]
    InvalidParams { size: usize, overlap: usize },

    #[error("Duplicate chunk id {0}")]
    DuplicateId(String),

    #[error("Chunk {index} is numbered {found}")]
    Numbering { index: usize, found: usize },

    #[error("Chunk {index} reports total {found}, expected {expected}")]
    Total { index: usize, found: usize, expected: usize },

    #[error("Chunk {index} exceeds {max} characters")]
    TooLong { index: usize, max: usize },
}

/// Sliding window over `text` with step `size - overlap`.
///
/// Windows are measured in `char`s so multi-byte text never splits inside
/// a code point. Empty text yields no chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize, base: &Metadata) -> Result<Vec<Chunk>, ChunkError> {
    if size == 0 || overlap >= size {
        return Err(ChunkError::InvalidParams { size, overlap });
    }
    // Byte offset of every char boundary, plus the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + size).min(len);
        chunks.push(Chunk {
            id: Uuid::new_v4().to_string(),
            content: text[bounds[start]..bounds[end]].to_string(),
            embedding: None,
            metadata: Metadata {
                source: base.source.clone(),
                page_number: base.page_number,
                chunk_number: chunks.len() + 1,
                total_chunks: 0,
            },
        });
        if end == len {
            break;
        }
        start += step;
    }

    let total = chunks.len();
    for chunk in &mut chunks {
        chunk.metadata.total_chunks = total;
    }
    Ok(chunks)
}

/// Check ids are unique, numbering is `1..=n` and totals agree.
pub fn validate_chunks(chunks: &[Chunk], size: usize) -> Result<(), ChunkError> {
    let mut seen = HashSet::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        if !seen.insert(chunk.id.as_str()) {
            return Err(ChunkError::DuplicateId(chunk.id.clone()));
        }
        if chunk.metadata.chunk_number != index + 1 {
            return Err(ChunkError::Numbering { index, found: chunk.metadata.chunk_number });
        }
        if chunk.metadata.total_chunks != chunks.len() {
            return Err(ChunkError::Total {
                index,
                found: chunk.metadata.total_chunks,
                expected: chunks.len(),
            });
        }
        if chunk.content.chars().count() > size {
            return Err(ChunkError::TooLong { index, max: size });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "chunker_tests.rs"]
mod tests;
