use std::sync::Arc;

use crate::core::config::{AppPaths, Settings};
use crate::engine::{QueryEngine, QueryEngineTool, SubQuestionEngine};
use crate::ingest::{self, chunker, chunker::ChunkerConfig};
use crate::llm::openai::OpenAiProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::{credential_from_env, MISSING_CREDENTIAL_WARNING};
use crate::transcript::TranscriptStore;

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes and background tasks.
///
/// Contains references to:
/// - Configuration and paths
/// - The sub-question router over the per-datasheet query tools
/// - In-memory chat transcripts
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub has_credential: bool,
    pub router_engine: Arc<SubQuestionEngine>,
    pub transcripts: Arc<TranscriptStore>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading configuration
    /// 2. Checking the API credential (missing is a warning, not an error)
    /// 3. Parsing and chunking both datasheets (failure aborts startup)
    /// 4. Assembling the query tools and the sub-question router
    ///
    /// Embeddings are not requested here; each index builds lazily on
    /// first use, with a background warm task when the credential exists.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let settings = Arc::new(
            Settings::load(&paths).map_err(InitializationError::Config)?,
        );

        let api_key = credential_from_env();
        if api_key.is_none() {
            tracing::warn!("{}", MISSING_CREDENTIAL_WARNING);
        }
        let has_credential = api_key.is_some();

        let provider: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::new(&settings.openai, api_key)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let chunker_config = ChunkerConfig {
            chunk_size: settings.retrieval.chunk_size,
            chunk_overlap: settings.retrieval.chunk_overlap,
            max_chunks: settings.retrieval.max_chunks_per_document,
        };

        let mut tools = Vec::new();
        for source in ingest::fixed_sources(&paths.data_dir) {
            let document = ingest::load_document(&source.path)
                .map_err(|e| InitializationError::Ingest(e.into()))?;
            let chunks =
                chunker::split_into_chunks(&document.text, &document.source, &chunker_config);
            tracing::info!(
                "Ingested {} ({} chars, {} chunks)",
                document.source,
                document.text.len(),
                chunks.len()
            );

            let engine =
                QueryEngine::new(&document, chunks, provider.clone(), &settings.retrieval);
            tools.push(QueryEngineTool::new(
                source.tool_name,
                source.description,
                engine,
            ));
        }

        let router_engine = Arc::new(
            SubQuestionEngine::from_tools(
                tools,
                provider.clone(),
                settings.retrieval.max_sub_questions,
            )
            .map_err(|e| InitializationError::Tools(e.into()))?,
        );

        let state = Arc::new(AppState {
            paths,
            settings,
            has_credential,
            router_engine,
            transcripts: Arc::new(TranscriptStore::new()),
        });

        if state.has_credential {
            let engine = state.router_engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.warm().await {
                    tracing::warn!("Failed to warm vector indexes on startup: {}", e);
                }
            });
        }

        Ok(state)
    }
}
