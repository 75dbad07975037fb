use crate::models::Document;
use anyhow::Result;

/// Anything that can answer a nearest-neighbour query with documents
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// The `k` documents most similar to `query`, best match first
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}
