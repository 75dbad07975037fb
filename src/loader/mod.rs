pub mod splitter;

pub use splitter::RecursiveSplitter;

use crate::error::CodeQueryError;
use crate::models::Document;
use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};

/// Reads source files and cuts them into documents
#[derive(Debug, Clone, Default)]
pub struct ChunkLoader {
    splitter: RecursiveSplitter,
}

impl ChunkLoader {
    pub fn new(splitter: RecursiveSplitter) -> Self {
        Self { splitter }
    }

    /// Load one file and split it into chunks tagged with its path
    pub async fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read source file: {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);

        Ok(self
            .splitter
            .split_text(&text)
            .into_iter()
            .map(|chunk| Document::from_path(chunk, path))
            .collect())
    }

    /// Load every file concurrently; documents keep the order of `files`
    ///
    /// Fails with `NoDocuments` when nothing was produced, so callers never
    /// reach the network with an empty set.
    pub async fn load_documents(&self, root: &Path, files: &[PathBuf]) -> Result<Vec<Document>> {
        let per_file = try_join_all(files.iter().map(|path| self.load_file(path))).await?;
        let documents: Vec<Document> = per_file.into_iter().flatten().collect();

        if documents.is_empty() {
            return Err(CodeQueryError::NoDocuments(root.to_path_buf()).into());
        }

        tracing::info!(files = files.len(), chunks = documents.len(), "loaded source chunks");
        Ok(documents)
    }
}
