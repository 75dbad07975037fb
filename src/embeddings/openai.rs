use crate::embeddings::EmbeddingProvider;
use crate::http::HttpClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiEmbeddingProvider {
    http: HttpClient,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(http: HttpClient, model: impl Into<String>) -> Self {
        Self {
            http,
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn compute_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut response: EmbeddingResponse = self
            .http
            .post_json("embeddings", &request)
            .await
            .with_context(|| format!("embedding request with {} failed", self.model))?;

        // The API may answer out of order; `index` refers to the input position
        response.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            response.data.len() == inputs.len(),
            "OpenAI returned {} embeddings for {} inputs",
            response.data.len(),
            inputs.len()
        );

        let embeddings: Vec<Vec<f32>> = response
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect();

        if embeddings.iter().any(|e| e.is_empty()) {
            anyhow::bail!("OpenAI returned an empty embedding");
        }

        Ok(embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
