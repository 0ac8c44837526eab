//! Fixed-size character windows with overlap.
//!
//! Windows start every `chunk_size - chunk_overlap` characters, so consecutive
//! chunks of one document share exactly `chunk_overlap` characters. Sizes are
//! counted in Unicode scalar values; offsets are byte offsets into the
//! document text and always fall on character boundaries.

use crate::loader::Document;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a chunk came from, for citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: Uuid,
    pub filename: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk within its document.
    pub index: usize,
    pub text: String,
    pub source: SourceRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily chunk a document. Call again for a fresh pass.
    pub fn chunk<'a>(&self, document: &'a Document) -> Chunks<'a> {
        Chunks::new(
            &document.text,
            document.id,
            &document.filename,
            self.chunk_size,
            self.chunk_size - self.chunk_overlap,
        )
    }

    /// Chunk every document, in order.
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }
}

/// Iterator over the chunks of one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    document_id: Uuid,
    filename: &'a str,
    /// Byte offset of every character, plus `text.len()` as a sentinel.
    boundaries: Vec<usize>,
    size: usize,
    step: usize,
    next_char: usize,
    index: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, document_id: Uuid, filename: &'a str, size: usize, step: usize) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self {
            text,
            document_id,
            filename,
            done: text.is_empty(),
            boundaries,
            size,
            step,
            next_char: 0,
            index: 0,
        }
    }

    fn char_count(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.char_count();
        let start_char = self.next_char;
        let end_char = (start_char + self.size).min(total);
        let start = self.boundaries[start_char];
        let end = self.boundaries[end_char];

        let chunk = Chunk {
            index: self.index,
            text: self.text[start..end].to_string(),
            source: SourceRef {
                document_id: self.document_id,
                filename: self.filename.to_string(),
                start,
                end,
            },
        };

        if end_char >= total {
            self.done = true;
        } else {
            self.next_char += self.step;
            self.index += 1;
        }

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FileKind;
    use rstest::rstest;

    fn doc(text: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            filename: "test.txt".to_string(),
            kind: FileKind::Txt,
            bytes: text.as_bytes().to_vec(),
            text: text.to_string(),
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 10)]
    #[case(10, 12)]
    fn test_invalid_parameters(#[case] size: usize, #[case] overlap: usize) {
        let err = TextChunker::new(size, overlap).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_windows_and_overlap() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let document = doc("abcdefghij");
        let texts: Vec<String> = chunker.chunk(&document).map(|c| c.text).collect();

        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let chunker = TextChunker::new(7, 3).unwrap();
        let document = doc("The quick brown fox jumps over the lazy dog");
        let chunks: Vec<Chunk> = chunker.chunk(&document).collect();

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(&prev[prev.len() - 3..], &next[..3]);
        }
        assert!(chunks.last().unwrap().source.end == document.text.len());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(1500, 200).unwrap();
        let document = doc("The sky is blue. Grass is green.");
        let chunks: Vec<Chunk> = chunker.chunk(&document).collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, document.text);
        assert_eq!(chunks[0].source.start, 0);
        assert_eq!(chunks[0].source.end, document.text.len());
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = TextChunker::new(10, 2).unwrap();
        assert_eq!(chunker.chunk(&doc("")).count(), 0);
    }

    #[test]
    fn test_deterministic_and_restartable() {
        let chunker = TextChunker::new(5, 2).unwrap();
        let document = doc("deterministic chunking is a property worth testing");

        let first: Vec<Chunk> = chunker.chunk(&document).collect();
        let second: Vec<Chunk> = chunker.chunk(&document).collect();
        assert_eq!(first, second);

        let iter = chunker.chunk(&document);
        let replay: Vec<Chunk> = iter.clone().collect();
        assert_eq!(replay, iter.collect::<Vec<_>>());
    }

    #[test]
    fn test_multibyte_utf8_offsets() {
        let chunker = TextChunker::new(3, 1).unwrap();
        let document = doc("héllo wörld ✓");
        for chunk in chunker.chunk(&document) {
            assert_eq!(
                &document.text[chunk.source.start..chunk.source.end],
                chunk.text
            );
            assert!(chunk.text.chars().count() <= 3);
        }
    }

    #[test]
    fn test_indices_are_contiguous() {
        let chunker = TextChunker::new(4, 2).unwrap();
        let document = doc("0123456789");
        let indices: Vec<usize> = chunker.chunk(&document).map(|c| c.index).collect();
        assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());
    }
}
