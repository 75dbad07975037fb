use crate::models::ChatMessage;
use anyhow::Result;

/// Trait for chat models that turn a message list into a reply
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the assistant's reply text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier, used in logs
    fn model(&self) -> &str;
}
