// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! PDF text extraction behind a pluggable trait.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to extract PDF text: {0}")]
    Text(String),
}

/// Text and page count of one PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
}

/// `(bytes) -> (text, page_count)`. Implementations are CPU-bound and are
/// called off the async executor.
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError>;
}

/// Extracts real text with `pdf-extract`; pages are counted with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Parse(e.to_string()))?;
        let page_count = doc.get_pages().len() as u32;
        let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Text(e.to_string()))?;
        Ok(ExtractedText { text: clean_text(&raw), page_count })
    }
}

/// Returns fixed text regardless of input.
#[derive(Debug, Clone)]
pub struct StubPdfExtractor {
    text: String,
    page_count: u32,
}

impl StubPdfExtractor {
    pub fn new(text: impl Into<String>, page_count: u32) -> Self {
        Self { text: text.into(), page_count }
    }
}

impl PdfExtractor for StubPdfExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        Ok(ExtractedText { text: self.text.clone(), page_count: self.page_count })
    }
}

/// Trim lines and drop blank ones.
fn clean_text(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_ignores_input() {
        let stub = StubPdfExtractor::new("alpha beta gamma", 1);
        let out = stub.extract(b"%PDF-1.4 garbage").unwrap();
        assert_eq!(out.text, "alpha beta gamma");
        assert_eq!(out.page_count, 1);
    }

    #[test]
    fn test_real_extractor_rejects_garbage() {
        let err = PdfTextExtractor.extract(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n\n   \n b  "), "a\nb");
    }
}
