use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::core::config::RetrievalSettings;
use crate::index::{ScoredChunk, VectorIndex};
use crate::ingest::chunker::TextChunk;
use crate::ingest::Document;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

use super::EngineError;

const ANSWER_SYSTEM_PROMPT: &str = concat!(
    "You answer questions about hardware product datasheets. ",
    "Use only the numbered excerpts provided and cite them with [N] notation. ",
    "If the excerpts do not contain the answer, say so instead of guessing."
);

/// One retrieved chunk as it appears in a response trace.
#[derive(Debug, Clone, Serialize)]
pub struct SourceNode {
    pub source: String,
    pub chunk_id: String,
    pub score: f64,
    pub snippet: String,
}

/// Answer for a single question against one document.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub answer: String,
    pub sources: Vec<SourceNode>,
}

/// Retrieval plus answer synthesis over one document.
///
/// Chunks are prepared eagerly at startup; the vector index is built on
/// first use (or by the startup warm task) because embedding needs the
/// API credential. The build is memoized for the process lifetime.
pub struct QueryEngine {
    source: String,
    document_id: String,
    chunks: Vec<TextChunk>,
    index: OnceCell<VectorIndex>,
    provider: Arc<dyn LlmProvider>,
    top_k: usize,
    max_context_length: usize,
}

impl QueryEngine {
    pub fn new(
        document: &Document,
        chunks: Vec<TextChunk>,
        provider: Arc<dyn LlmProvider>,
        retrieval: &RetrievalSettings,
    ) -> Self {
        Self {
            source: document.source.clone(),
            document_id: document.id.clone(),
            chunks,
            index: OnceCell::new(),
            provider,
            top_k: retrieval.top_k,
            max_context_length: retrieval.max_context_length,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_ready(&self) -> bool {
        self.index.get().is_some()
    }

    /// Build the index now instead of on first query.
    pub async fn warm(&self) -> Result<usize, EngineError> {
        let index = self.index().await?;
        Ok(index.chunk_count())
    }

    async fn index(&self) -> Result<&VectorIndex, EngineError> {
        let index = self
            .index
            .get_or_try_init(|| async {
                tracing::info!("Building vector index for {}", self.source);
                VectorIndex::build(&self.source, self.chunks.clone(), self.provider.as_ref()).await
            })
            .await?;
        Ok(index)
    }

    /// Retrieve the most similar chunks and answer from them.
    pub async fn query(&self, question: &str) -> Result<EngineResponse, EngineError> {
        let index = self.index().await?;

        let embeddings = self.provider.embed(&[question.to_string()]).await?;
        let query_embedding = embeddings.first().ok_or(EngineError::EmptyEmbedding)?;

        let hits = index.top_k(query_embedding, self.top_k);
        let context = format_context(&hits, self.max_context_length);

        let messages = vec![
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(format!("Question: {}\n\nExcerpts:\n{}", question, context)),
        ];
        let answer = self.provider.chat(ChatRequest::new(messages)).await?;

        let sources = hits
            .into_iter()
            .map(|hit| {
                let snippet = snippet(&hit.chunk.text);
                SourceNode {
                    source: hit.chunk.source,
                    chunk_id: hit.chunk.chunk_id,
                    score: hit.score,
                    snippet,
                }
            })
            .collect();

        Ok(EngineResponse {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

/// Format retrieved chunks into a cited context block.
fn format_context(hits: &[ScoredChunk], max_length: usize) -> String {
    let mut context = String::new();
    let mut current_length = 0;

    for (i, hit) in hits.iter().enumerate() {
        let chunk_text = &hit.chunk.text;

        // Headroom for the citation line
        let addition_length = chunk_text.len() + 50;
        if current_length + addition_length > max_length {
            break;
        }

        context.push_str(&format!(
            "[{}] (Source: {}, relevance: {:.2})\n{}\n\n",
            i + 1,
            hit.chunk.source,
            hit.score,
            chunk_text
        ));

        current_length += addition_length;
    }

    context.trim().to_string()
}

fn snippet(text: &str) -> String {
    const SNIPPET_CHARS: usize = 200;

    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }

    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}
