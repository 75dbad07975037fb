use anyhow::Result;

/// Trait for embedding providers that can compute semantic vectors from text
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute one embedding per input, in input order
    async fn compute_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Compute the embedding of a single text, typically a user query
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.compute_embeddings(&[content.to_string()]).await?;
        match embeddings.pop() {
            Some(embedding) if embeddings.is_empty() => Ok(embedding),
            _ => anyhow::bail!("Expected exactly one embedding for a single input"),
        }
    }

    /// Name of the embedding model, persisted alongside the index
    fn model(&self) -> &str;
}
