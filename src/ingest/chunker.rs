//! Splits extracted datasheet text into overlapping chunks.
//!
//! Chunks are character windows that prefer to end at a sentence boundary,
//! so table rows and spec sentences stay intact where possible.

use serde::{Deserialize, Serialize};

/// Chunking parameters, usually taken from the retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks
    pub chunk_overlap: usize,
    /// Maximum chunks taken from one document
    pub max_chunks: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            max_chunks: 512,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    /// The text content
    pub text: String,
    /// Source document name
    pub source: String,
    /// Character offset in the original document
    pub start_offset: usize,
    /// Chunk index within the source
    pub chunk_index: usize,
}

/// Split text into overlapping chunks.
pub fn split_into_chunks(text: &str, source: &str, config: &ChunkerConfig) -> Vec<TextChunk> {
    let chunk_size = config.chunk_size;
    let overlap = config.chunk_overlap;
    let max_chunks = config.max_chunks;

    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();

    if total_chars == 0 {
        return chunks;
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < total_chars && chunks.len() < max_chunks {
        let end = (start + chunk_size).min(total_chars);
        let chunk_text: String = chars[start..end].iter().collect();

        // Try to break at a sentence boundary
        let final_text = if end < total_chars {
            cut_at_sentence_boundary(&chunk_text)
        } else {
            chunk_text
        };

        let trimmed = final_text.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                chunk_id: uuid::Uuid::new_v4().to_string(),
                text: trimmed.to_string(),
                source: source.to_string(),
                start_offset: start,
                chunk_index: chunks.len(),
            });
        }

        start += step;
    }

    chunks
}

/// Cut the chunk at the last sentence ending in its final fifth.
///
/// Works on char boundaries throughout; datasheets carry non-ASCII symbols
/// (micro signs, degree marks) that a byte-indexed scan would split.
fn cut_at_sentence_boundary(text: &str) -> String {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let char_count = text.chars().count();
    let search_start = text
        .char_indices()
        .map(|(offset, _)| offset)
        .nth(char_count * 4 / 5)
        .unwrap_or(0);
    let search_text = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            let cut_pos = search_start + pos + ending.len();
            return text[..cut_pos].to_string();
        }
    }

    // No good boundary found, return as-is
    text.to_string()
}
