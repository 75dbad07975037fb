use super::index::VectorIndex;
use super::r#trait::Retriever;
use crate::constants::{INDEX_ARGS_FILE_NAME, INDEX_ENTRIES_FILE_NAME};
use crate::embeddings::EmbeddingProvider;
use crate::error::CodeQueryError;
use crate::models::Document;
use crate::utils;
use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SPACE: &str = "cosine";

/// Contents of `args.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexArgs {
    pub space: String,
    pub dimension: usize,
    pub embedding_model: String,
    pub count: usize,
}

/// Embedded documents plus the provider used to embed queries against them
pub struct VectorStore {
    index: VectorIndex,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl VectorStore {
    pub fn new(index: VectorIndex, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embeddings }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether a persisted index lives in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_ARGS_FILE_NAME).is_file() && dir.join(INDEX_ENTRIES_FILE_NAME).is_file()
    }

    /// Load the persisted index from `dir`, or `None` if there is none
    pub async fn lookup(dir: &Path, embeddings: Arc<dyn EmbeddingProvider>) -> Result<Option<Self>> {
        if !Self::exists(dir) {
            return Ok(None);
        }
        Self::load(dir, embeddings).await.map(Some)
    }

    pub async fn load(dir: &Path, embeddings: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let args_path = dir.join(INDEX_ARGS_FILE_NAME);
        let args: IndexArgs = serde_json::from_str(
            &tokio::fs::read_to_string(&args_path)
                .await
                .with_context(|| format!("Failed to read {}", args_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", args_path.display()))?;

        let entries_path = dir.join(INDEX_ENTRIES_FILE_NAME);
        let index: VectorIndex = serde_json::from_str(
            &tokio::fs::read_to_string(&entries_path)
                .await
                .with_context(|| format!("Failed to read {}", entries_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", entries_path.display()))?;

        anyhow::ensure!(
            args.space == SPACE,
            "Unsupported index space '{}' in {}",
            args.space,
            args_path.display()
        );
        anyhow::ensure!(
            args.dimension == index.dimension() && args.count == index.len(),
            "Index files in {} disagree: args.json says {} x {}, index.json holds {} x {}",
            dir.display(),
            args.count,
            args.dimension,
            index.len(),
            index.dimension()
        );
        if args.embedding_model != embeddings.model() {
            tracing::warn!(
                stored = %args.embedding_model,
                current = embeddings.model(),
                "vector store was built with a different embedding model; results may be meaningless"
            );
        }

        tracing::info!(dir = %dir.display(), entries = index.len(), "vector store loaded");
        Ok(Self::new(index, embeddings))
    }

    /// Persist `args.json` and `index.json` under `dir`
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let args = IndexArgs {
            space: SPACE.to_string(),
            dimension: self.index.dimension(),
            embedding_model: self.embeddings.model().to_string(),
            count: self.index.len(),
        };
        utils::write_json(&dir.join(INDEX_ARGS_FILE_NAME), &args).await?;
        utils::write_json(&dir.join(INDEX_ENTRIES_FILE_NAME), &self.index).await?;
        tracing::info!(dir = %dir.display(), entries = args.count, "vector store saved");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Retriever for VectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embeddings
            .compute_embedding(query)
            .await
            .context("Failed to embed query")?;

        let hits = self.index.search(&vector, k)?;
        tracing::debug!(hits = hits.len(), top_score = hits.first().map(|h| h.1), "similarity search");

        Ok(hits
            .into_iter()
            .filter_map(|(position, _)| self.index.get(position))
            .map(|entry| entry.document.clone())
            .collect())
    }
}

/// Embeds documents in fixed-size batches and assembles a [`VectorStore`]
pub struct IndexBuilder {
    embeddings: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    error_file: PathBuf,
    source_root: PathBuf,
    progress: ProgressBar,
}

impl IndexBuilder {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, error_file: impl Into<PathBuf>) -> Self {
        Self {
            embeddings,
            batch_size: 5,
            concurrency: 4,
            error_file: error_file.into(),
            source_root: PathBuf::from("."),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Number of batches in flight at once; results still arrive in order
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Repository the documents came from, named when there is nothing to embed
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    /// Embed every non-blank document. On failure the error is dumped to the
    /// error file and nothing is kept.
    pub async fn build(&self, documents: Vec<Document>) -> Result<VectorStore> {
        let total_documents = documents.len();
        let documents: Vec<Document> = documents.into_iter().filter(|d| !d.is_blank()).collect();
        if documents.len() < total_documents {
            tracing::info!(
                dropped = total_documents - documents.len(),
                "skipping documents with empty content"
            );
        }
        if documents.is_empty() {
            return Err(CodeQueryError::NoDocuments(self.source_root.clone()).into());
        }

        let batches: Vec<&[Document]> = documents.chunks(self.batch_size).collect();
        let batches_total = batches.len();
        let batches_done = AtomicUsize::new(0);
        self.progress.set_length(batches_total as u64);
        tracing::info!(
            documents = documents.len(),
            batches = batches_total,
            model = self.embeddings.model(),
            "embedding documents"
        );

        let result: Result<Vec<Vec<Vec<f32>>>> = stream::iter(batches.iter().enumerate())
            .map(|(i, batch)| {
                let batches_done = &batches_done;
                async move {
                    let inputs: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
                    let vectors = self
                        .embeddings
                        .compute_embeddings(&inputs)
                        .await
                        .with_context(|| format!("Embedding batch {} of {} failed", i + 1, batches_total))?;
                    anyhow::ensure!(
                        vectors.len() == batch.len(),
                        "Embedding batch {} returned {} vectors for {} documents",
                        i + 1,
                        vectors.len(),
                        batch.len()
                    );
                    batches_done.fetch_add(1, Ordering::SeqCst);
                    self.progress.inc(1);
                    Ok::<_, anyhow::Error>(vectors)
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await;

        let vectors = match result {
            Ok(vectors) => vectors,
            Err(err) => {
                self.progress.abandon();
                return Err(self.fail(err, batches_done.into_inner(), batches_total).await);
            }
        };
        self.progress.finish_and_clear();

        let mut index = VectorIndex::default();
        for (document, vector) in documents.into_iter().zip(vectors.into_iter().flatten()) {
            if let Err(err) = index.add(document, vector) {
                return Err(self.fail(err, batches_total, batches_total).await);
            }
        }

        Ok(VectorStore::new(index, self.embeddings.clone()))
    }

    async fn fail(&self, err: anyhow::Error, batches_done: usize, batches_total: usize) -> anyhow::Error {
        if let Err(report_err) = utils::write_error_report(&self.error_file, &err).await {
            tracing::error!(error = %report_err, "could not write error report");
        } else {
            tracing::error!(path = %self.error_file.display(), "embedding failed, error report written");
        }

        let message = err.root_cause().to_string();
        err.context(CodeQueryError::EmbeddingBuildFailure {
            message,
            batches_done,
            batches_total,
        })
    }
}
