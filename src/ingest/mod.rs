//! Datasheet ingestion.
//!
//! Reads the two fixed PDF inputs, extracts their text, and prepares them
//! for chunking. Everything happens at process start; nothing is cached on
//! disk, so each run re-parses from scratch.

pub mod chunker;

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to extract text from {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{path:?} contains no extractable text (may be image-based)")]
    EmptyDocument { path: PathBuf },
}

/// One fixed datasheet input: where it lives and how its query tool is named.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub path: PathBuf,
    pub tool_name: &'static str,
    pub description: &'static str,
}

/// The two datasheets this service answers questions about.
pub fn fixed_sources(data_dir: &Path) -> Vec<DocumentSource> {
    vec![
        DocumentSource {
            path: data_dir.join("pxie-4139_specifications.pdf"),
            tool_name: "pxie-4139",
            description: "Provides information about pxie-4139 instrument",
        },
        DocumentSource {
            path: data_dir.join("pxie-4147_specifications.pdf"),
            tool_name: "pxie-4147",
            description: "Provides information about pxie-4147 instrument",
        },
    ]
}

/// Extracted text of one datasheet.
#[derive(Debug, Clone)]
pub struct Document {
    /// Content hash, stable across runs for identical input files.
    pub id: String,
    /// File name, used as the citation source.
    pub source: String,
    pub text: String,
}

/// Read a PDF from disk and extract its text.
pub fn load_document(path: &Path) -> Result<Document, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| IngestError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument {
            path: path.to_path_buf(),
        });
    }

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(Document {
        id: hash_content(&text),
        source,
        text,
    })
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
