//! On-disk document cache.
//!
//! Once `documents.json` exists it is the authoritative document set: there is
//! no staleness check, and deleting the file is the only way to rescan.

use crate::models::Document;
use crate::utils;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct DocumentCache {
    path: PathBuf,
}

impl DocumentCache {
    /// Cache stored at `path` (normally `<cache_dir>/documents.json`)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Cached documents, or `None` when nothing has been written yet
    pub async fn lookup(&self) -> Result<Option<Vec<Document>>> {
        if !self.exists() {
            return Ok(None);
        }

        let data = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read document cache: {}", self.path.display()))?;
        let documents: Vec<Document> = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse document cache: {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), documents = documents.len(), "document cache hit");
        Ok(Some(documents))
    }

    /// Write the full document set, creating the cache directory if needed
    pub async fn store(&self, documents: &[Document]) -> Result<()> {
        utils::write_json(&self.path, documents).await?;
        tracing::info!(path = %self.path.display(), documents = documents.len(), "document cache written");
        Ok(())
    }
}
