use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to ingest datasheets: {0}")]
    Ingest(#[source] anyhow::Error),

    #[error("Failed to assemble query tools: {0}")]
    Tools(#[source] anyhow::Error),
}
