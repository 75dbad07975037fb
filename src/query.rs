use crate::constants::{ASSISTANT_PERSONA, EXIT_SENTINEL, QUERY_PROMPT};
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Document};
use crate::vector_store::Retriever;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Persona followed by the retrieved documents as comma-joined JSON objects
pub fn build_system_prompt(documents: &[Document]) -> Result<String> {
    let serialized = documents
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to serialize retrieved documents")?;
    Ok(format!("{}{}", ASSISTANT_PERSONA, serialized.join(",")))
}

/// Interactive question/answer session over a retriever and a chat model.
///
/// Every question is answered independently: no history is sent.
pub struct QueryLoop {
    retriever: Arc<dyn Retriever>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl QueryLoop {
    pub fn new(retriever: Arc<dyn Retriever>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            chat,
            top_k: 3,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Retrieve context for `question` and ask the chat model about it
    pub async fn answer(&self, question: &str) -> Result<String> {
        let documents = self
            .retriever
            .similarity_search(question, self.top_k)
            .await
            .context("Similarity search failed")?;
        tracing::debug!(documents = documents.len(), "retrieved context");

        let messages = [
            ChatMessage::system(build_system_prompt(&documents)?),
            ChatMessage::user(question),
        ];
        self.chat.chat(&messages).await
    }

    /// Prompt, read a line, answer, repeat until `exit` or end of input
    pub async fn run<R, W>(&self, reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            writer.write_all(QUERY_PROMPT.as_bytes()).await?;
            writer.flush().await?;

            let line = match lines.next_line().await.context("Failed to read input")? {
                Some(line) => line,
                None => break,
            };

            // only the exact sentinel ends the session
            if line == EXIT_SENTINEL {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let reply = self.answer(&line).await?;
            writer.write_all(format!("\nAI: {}\n", reply).as_bytes()).await?;
        }

        writer.write_all(b"\n\nBye\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
