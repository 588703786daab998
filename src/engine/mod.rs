//! Query engines and the sub-question router.
//!
//! One `QueryEngine` per datasheet answers questions from that document's
//! vector index. `QueryEngineTool` gives an engine a stable name and
//! description, and `SubQuestionEngine` decomposes a user question across
//! the named tools and synthesizes the final answer.

pub mod query;
pub mod subquestion;
pub mod tool;

pub use query::{EngineResponse, QueryEngine, SourceNode};
pub use subquestion::{RouterResponse, SubAnswer, SubQuestionEngine};
pub use tool::{QueryEngineTool, ToolMetadata};

use thiserror::Error;

use crate::index::IndexError;
use crate::llm::provider::LlmError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("embedding response was empty")]
    EmptyEmbedding,
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    #[error("no tool named {0}")]
    UnknownTool(String),
}

impl EngineError {
    /// True when the underlying failure is the absent API key.
    pub fn is_missing_credential(&self) -> bool {
        matches!(
            self,
            EngineError::Llm(LlmError::MissingCredential)
                | EngineError::Index(IndexError::Embed(LlmError::MissingCredential))
        )
    }
}
