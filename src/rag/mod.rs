// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Retrieval-augmented generation pipeline.
//!
//! Uploads are staged, extracted, chunked and pushed to the vector DB by
//! [`DocumentIngestor`]. Queries go through [`Retriever`] and
//! [`RagOrchestrator`], which builds the augmented prompt and drives an
//! [`LlmClient`] in blocking or streaming mode.

pub mod chunker;
pub mod ingest;
pub mod llm;
pub mod orchestrator;
pub mod pdf;
pub mod prompt;
pub mod retriever;
pub mod types;
pub mod vector_db;

pub use chunker::{chunk_text, validate_chunks, ChunkError};
pub use ingest::{DocumentIngestor, IngestError, IngestSettings, Upload};
pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use orchestrator::{QueryAnswer, RagError, RagEvent, RagOrchestrator};
pub use pdf::{ExtractError, PdfExtractor, PdfTextExtractor, StubPdfExtractor};
pub use retriever::{RetrieveError, Retriever};
pub use types::{Chunk, Document, DocumentType, Metadata};
pub use vector_db::{HttpVectorStore, VectorStore, VectorStoreError};
