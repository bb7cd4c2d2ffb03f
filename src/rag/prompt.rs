// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prompt augmentation from retrieved chunks.

use std::collections::HashSet;
use std::fmt::Write;

use super::types::Chunk;

const NEUTRAL_PREAMBLE: &str = "You are a helpful AI assistant. Please answer the following question:";

const CONTEXT_PREAMBLE: &str = "You are a helpful AI assistant. Please answer the following question based only on the provided context information. If the context doesn't contain the answer, say that you don't have enough information to answer and avoid making up a response.";

/// Render chunks as numbered `Document i: <source>` blocks.
pub fn format_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let mut out = String::from("Relevant information from documents:\n\n");
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = write!(
            out,
            "Document {}: {}\n---\n{}\n---\n\n",
            i + 1,
            chunk.metadata.source,
            chunk.content
        );
    }
    out
}

/// Build the prompt sent to the LLM. Without chunks no context is invented.
pub fn build_prompt(query: &str, chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return format!("{}\n\nQuestion: {}\n\nAnswer:", NEUTRAL_PREAMBLE, query);
    }
    format!(
        "{}\n\nContext Information:\n{}\n\nQuestion: {}\n\nAnswer based on the context:",
        CONTEXT_PREAMBLE,
        format_context(chunks),
        query
    )
}

/// Distinct chunk sources in first-seen order.
pub fn extract_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.metadata.source.as_str()))
        .map(|c| c.metadata.source.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::Metadata;

    fn chunk(id: &str, source: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: content.to_string(),
            embedding: None,
            metadata: Metadata { source: source.to_string(), ..Default::default() },
        }
    }

    #[test]
    fn test_neutral_prompt_has_no_context() {
        let prompt = build_prompt("What is Rust?", &[]);
        assert!(prompt.ends_with("Question: What is Rust?\n\nAnswer:"));
        assert!(!prompt.contains("Context Information"));
        assert!(!prompt.contains("Document 1"));
    }

    #[test]
    fn test_context_prompt_numbers_documents() {
        let chunks = [chunk("a", "a.pdf", "first"), chunk("b", "b.txt", "second")];
        let prompt = build_prompt("q?", &chunks);
        assert!(prompt.contains("Document 1: a.pdf\n---\nfirst\n---\n"));
        assert!(prompt.contains("Document 2: b.txt\n---\nsecond\n---\n"));
        assert!(prompt.contains("based only on the provided context"));
        assert!(prompt.ends_with("Question: q?\n\nAnswer based on the context:"));
        assert!(prompt.find("Document 1").unwrap() < prompt.find("Document 2").unwrap());
    }

    #[test]
    fn test_sources_deduplicated_in_order() {
        let chunks = [
            chunk("1", "b.pdf", "x"),
            chunk("2", "a.pdf", "y"),
            chunk("3", "b.pdf", "z"),
        ];
        assert_eq!(extract_sources(&chunks), vec!["b.pdf", "a.pdf"]);
        assert!(extract_sources(&[]).is_empty());
    }
}
