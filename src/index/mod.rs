//! In-memory vector index over one document's chunks.
//!
//! Each datasheet gets exactly one index. Embeddings are requested in a
//! single batched provider call when the index is built and live only for
//! the process lifetime; a restart rebuilds everything.

use std::cmp::Ordering;

use thiserror::Error;

use crate::ingest::chunker::TextChunk;
use crate::llm::provider::{LlmError, LlmProvider};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding request failed: {0}")]
    Embed(#[from] LlmError),
    #[error("embedding count mismatch: {expected} chunks, {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f64,
}

#[derive(Debug)]
pub struct VectorIndex {
    source: String,
    chunks: Vec<TextChunk>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed all chunks in one provider call and build the index.
    pub async fn build(
        source: &str,
        chunks: Vec<TextChunk>,
        provider: &dyn LlmProvider,
    ) -> Result<Self, IndexError> {
        let inputs: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = provider.embed(&inputs).await?;

        if embeddings.len() != chunks.len() {
            return Err(IndexError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            chunks,
            embeddings,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Top-k chunks by cosine similarity to the query embedding.
    pub fn top_k(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(self.embeddings.iter())
            .map(|(chunk, emb)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_embedding, emb),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
