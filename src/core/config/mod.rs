pub mod paths;

pub use paths::AppPaths;

use std::fs;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Typed application settings, loaded from `config.yml`.
///
/// Every field has a default so the service runs without a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub openai: OpenAiSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Extra CORS origins. Empty means local origins only.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Hard cap on chunks taken from one document
    pub max_chunks_per_document: usize,
    /// Chunks retrieved per sub-question
    pub top_k: usize,
    /// Maximum context length in characters
    pub max_context_length: usize,
    /// Cap on sub-questions per user query
    pub max_sub_questions: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            max_chunks_per_document: 512,
            top_k: 5,
            max_context_length: 4000,
            max_sub_questions: 5,
        }
    }
}

impl Settings {
    /// Load settings from the config file, falling back to defaults when the
    /// file is absent.
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }
}
