//! Tests for the chunking law.

use super::*;

fn meta() -> Metadata {
    Metadata { source: "doc.txt".to_string(), ..Default::default() }
}

/// Rebuild the source text from its chunks.
fn reassemble(chunks: &[Chunk], size: usize, overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i + 1 < chunks.len() {
            out.extend(chunk.content.chars().take(size - overlap));
        } else {
            out.push_str(&chunk.content);
        }
    }
    out
}

fn assert_law(text: &str, size: usize, overlap: usize) {
    let chunks = chunk_text(text, size, overlap, &meta()).unwrap();
    assert_eq!(reassemble(&chunks, size, overlap), text, "size {} overlap {}", size, overlap);
    validate_chunks(&chunks, size).unwrap();
    for pair in chunks.windows(2) {
        let prev: Vec<char> = pair[0].content.chars().collect();
        let tail: String = prev[prev.len() - overlap..].iter().collect();
        assert!(pair[1].content.starts_with(&tail));
    }
}

#[test]
fn test_chunking_law_across_shapes() {
    let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    assert_law(&text, 1000, 200);
    assert_law(&text, 100, 0);
    assert_law(&text, 7, 3);
    assert_law(&text[..1000], 1000, 200);
    assert_law(&text[..1001], 1000, 200);
}

#[test]
fn test_default_sizes_produce_expected_windows() {
    let text = "x".repeat(2500);
    let chunks = chunk_text(&text, 1000, 200, &meta()).unwrap();
    // Starts at 0, 800, 1600; the last window reaches the end.
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content.len(), 1000);
    assert_eq!(chunks[2].content.len(), 900);
    assert!(chunks.iter().all(|c| c.metadata.total_chunks == 3));
    assert_eq!(chunks[2].metadata.chunk_number, 3);
}

#[test]
fn test_short_text_is_single_chunk() {
    let chunks = chunk_text("alpha beta gamma", 1000, 200, &meta()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "alpha beta gamma");
    assert_eq!(chunks[0].metadata.source, "doc.txt");
    assert_eq!(chunks[0].metadata.chunk_number, 1);
    assert_eq!(chunks[0].metadata.total_chunks, 1);
}

#[test]
fn test_empty_text_has_no_chunks() {
    assert!(chunk_text("", 1000, 200, &meta()).unwrap().is_empty());
}

#[test]
fn test_multibyte_text_splits_on_chars() {
    let text = "é日本語🙂".repeat(50);
    assert_law(&text, 16, 4);
}

#[test]
fn test_invalid_params() {
    assert_eq!(
        chunk_text("abc", 10, 10, &meta()).unwrap_err(),
        ChunkError::InvalidParams { size: 10, overlap: 10 }
    );
    assert!(chunk_text("abc", 0, 0, &meta()).is_err());
}

#[test]
fn test_validate_rejects_bad_numbering() {
    let mut chunks = chunk_text(&"y".repeat(30), 10, 2, &meta()).unwrap();
    chunks[1].metadata.chunk_number = 5;
    assert!(matches!(validate_chunks(&chunks, 10), Err(ChunkError::Numbering { index: 1, found: 5 })));

    let mut chunks = chunk_text(&"y".repeat(30), 10, 2, &meta()).unwrap();
    chunks[1].id = chunks[0].id.clone();
    assert!(matches!(validate_chunks(&chunks, 10), Err(ChunkError::DuplicateId(_))));
}
