//! Wires the components together: enumerate, load, summarize, cache, embed.

use crate::cache::DocumentCache;
use crate::config::{Config, PathsConfig};
use crate::embeddings::EmbeddingProvider;
use crate::llm::ChatModel;
use crate::loader::ChunkLoader;
use crate::models::Document;
use crate::project::Project;
use crate::summarizer::Summarizer;
use crate::utils;
use crate::vector_store::{IndexBuilder, VectorStore};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;

/// Delete the persisted vector index; the document cache is left alone
pub fn clear_vector_store(paths: &PathsConfig) -> Result<bool> {
    println!("Clearing cache...");
    let removed = utils::remove_dir_if_exists(&paths.vector_store_dir)?;
    tracing::info!(dir = %paths.vector_store_dir.display(), removed, "vector store cleared");
    Ok(removed)
}

pub struct Pipeline {
    config: Config,
    summary_model: Arc<dyn ChatModel>,
    embeddings: Arc<dyn EmbeddingProvider>,
    summaries_enabled: bool,
    summary_progress: ProgressBar,
    embedding_progress: ProgressBar,
}

impl Pipeline {
    pub fn new(
        config: Config,
        summary_model: Arc<dyn ChatModel>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let summaries_enabled = config.summarizer.enabled;
        Self {
            config,
            summary_model,
            embeddings,
            summaries_enabled,
            summary_progress: ProgressBar::hidden(),
            embedding_progress: ProgressBar::hidden(),
        }
    }

    pub fn with_summaries(mut self, enabled: bool) -> Self {
        self.summaries_enabled = enabled;
        self
    }

    pub fn with_progress(mut self, summaries: ProgressBar, embeddings: ProgressBar) -> Self {
        self.summary_progress = summaries;
        self.embedding_progress = embeddings;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Source chunks followed by their summaries, from the cache when present
    pub async fn load_documents(&self, root: &Path) -> Result<Vec<Document>> {
        let cache = DocumentCache::new(self.config.paths.documents_file());
        if let Some(documents) = cache.lookup().await? {
            println!("Using cached documents from {}", cache.path().display());
            return Ok(documents);
        }

        let project = Project::discover(root)?;
        println!("Parsing codebase...");
        let files = project.source_files()?;

        let sources = ChunkLoader::default().load_documents(root, &files).await?;
        let mut documents = sources.clone();

        if self.summaries_enabled {
            println!("Summarizing {} chunks...", sources.len());
            let summaries = Summarizer::new(self.summary_model.clone(), self.config.summarizer.concurrency)
                .with_progress(self.summary_progress.clone())
                .summarize_all(&sources)
                .await?;
            documents.extend(summaries);
        }

        cache.store(&documents).await?;
        Ok(documents)
    }

    /// Load the persisted index, or build and persist one for `root`
    pub async fn load_or_build_index(&self, root: &Path) -> Result<VectorStore> {
        let paths = &self.config.paths;
        if let Some(store) = VectorStore::lookup(&paths.vector_store_dir, self.embeddings.clone()).await? {
            println!("Vector store exists, loading...");
            return Ok(store);
        }

        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve repository path: {}", root.display()))?;
        println!("Vector store does not exist, creating...");
        println!("Loading data from {} ...", root.display());

        let documents = self.load_documents(&root).await?;

        println!("Creating vector store...");
        let store = IndexBuilder::new(self.embeddings.clone(), &paths.error_file)
            .with_batch_size(self.config.embeddings.batch_size)
            .with_concurrency(self.config.embeddings.concurrency)
            .with_progress(self.embedding_progress.clone())
            .with_source_root(&root)
            .build(documents)
            .await?;
        store.save(&paths.vector_store_dir).await?;

        Ok(store)
    }
}
