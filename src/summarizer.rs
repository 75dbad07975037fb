use crate::constants::SUMMARY_INSTRUCTION;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Document};
use anyhow::{Context, Result};
use futures::future::try_join_all;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Produces one summary document per source chunk
pub struct Summarizer {
    model: Arc<dyn ChatModel>,
    concurrency: usize,
    progress: ProgressBar,
}

impl Summarizer {
    /// `concurrency` caps the number of summary requests in flight
    pub fn new(model: Arc<dyn ChatModel>, concurrency: usize) -> Self {
        Self {
            model,
            concurrency: concurrency.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Ask the model for a summary of one chunk
    pub async fn summarize(&self, document: &Document) -> Result<Document> {
        let messages = [
            ChatMessage::system(SUMMARY_INSTRUCTION),
            ChatMessage::user(format!(
                "File: {}\n\n{}",
                document.source_path(),
                document.content
            )),
        ];

        let summary = self
            .model
            .chat(&messages)
            .await
            .with_context(|| format!("Failed to summarize chunk of {}", document.source_path()))?;

        Ok(document.with_content(summary.trim()))
    }

    /// Summarize every document, at most `concurrency` at a time, keeping input order
    pub async fn summarize_all(&self, documents: &[Document]) -> Result<Vec<Document>> {
        let semaphore = Semaphore::new(self.concurrency);
        self.progress.set_length(documents.len() as u64);
        tracing::info!(
            chunks = documents.len(),
            concurrency = self.concurrency,
            model = self.model.model(),
            "summarizing chunks"
        );

        let summaries = try_join_all(documents.iter().map(|document| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .context("Summary semaphore closed")?;
                let summary = self.summarize(document).await?;
                self.progress.inc(1);
                Ok::<_, anyhow::Error>(summary)
            }
        }))
        .await?;

        self.progress.finish_and_clear();
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the user message and records peak concurrency
    #[derive(Default)]
    struct TrackingModel {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChatModel for TrackingModel {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("  summary of {}  ", user.lines().last().unwrap_or_default()))
        }

        fn model(&self) -> &str {
            "tracking"
        }
    }

    struct FailingModel;

    #[async_trait::async_trait]
    impl ChatModel for FailingModel {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
            anyhow::bail!("rate limited")
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    fn documents(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("chunk {}", i), format!("/repo/f{}.ts", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_summaries_pair_with_sources() {
        let model = Arc::new(TrackingModel::default());
        let summarizer = Summarizer::new(model.clone(), 3);

        let docs = documents(4);
        let summaries = summarizer.summarize_all(&docs).await.unwrap();

        assert_eq!(summaries.len(), 4);
        for (doc, summary) in docs.iter().zip(&summaries) {
            assert_eq!(summary.source_path(), doc.source_path());
            assert_eq!(summary.content, format!("summary of {}", doc.content));
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let model = Arc::new(TrackingModel::default());
        let summarizer = Summarizer::new(model.clone(), 3);

        summarizer.summarize_all(&documents(12)).await.unwrap();

        let peak = model.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {}", peak);
        assert!(peak >= 2, "requests never overlapped");
    }

    #[tokio::test]
    async fn test_failure_aborts_batch() {
        let summarizer = Summarizer::new(Arc::new(FailingModel), 3);
        let err = summarizer.summarize_all(&documents(2)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to summarize"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let model = Arc::new(TrackingModel::default());
        let summaries = Summarizer::new(model.clone(), 3)
            .summarize_all(&[])
            .await
            .unwrap();
        assert!(summaries.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
