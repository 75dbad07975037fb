//! In-memory doubles for the model and retrieval traits, used by tests.

use crate::embeddings::EmbeddingProvider;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Document};
use crate::vector_store::Retriever;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Chat model replaying canned replies and recording every request
#[derive(Debug)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    pub default_reply: String,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_reply: "mock response".into(),
        }
    }
}

impl MockChatModel {
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatModel for MockChatModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| self.default_reply.clone()))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/// Embedding provider hashing bytes into a small bag-of-bytes vector
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail_after_batches: Option<usize>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self {
            dimension: 16,
            fail_after_batches: None,
            batches: Mutex::new(Vec::new()),
        }
    }
}

impl MockEmbeddingProvider {
    /// Succeed for the first `n` batches, then fail every call
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after_batches: Some(n),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Every input received, in call order
    pub fn inputs(&self) -> Vec<String> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for byte in text.bytes().filter(u8::is_ascii_alphanumeric) {
            vector[byte as usize % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn compute_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let previous = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(inputs.to_vec());
            batches.len() - 1
        };
        if let Some(limit) = self.fail_after_batches {
            if previous >= limit {
                anyhow::bail!("mock embedding failure");
            }
        }
        Ok(inputs.iter().map(|input| self.embed(input)).collect())
    }

    fn model(&self) -> &str {
        "mock-embedding"
    }
}

/// Retriever returning the same documents for every query
#[derive(Debug, Default)]
pub struct StaticRetriever {
    documents: Vec<Document>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries received, with the requested `k`
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        Ok(self.documents.iter().take(k).cloned().collect())
    }
}
