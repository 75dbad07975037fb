use crate::http::HttpClient;
use crate::llm::ChatModel;
use crate::models::ChatMessage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Chat model backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiChatModel {
    http: HttpClient,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChatModel {
    pub fn new(http: HttpClient, model: impl Into<String>) -> Self {
        Self {
            http,
            model: model.into(),
            temperature: None,
        }
    }

    /// Fix the sampling temperature (0 for deterministic output)
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .http
            .post_json("chat/completions", &request)
            .await
            .with_context(|| format!("chat completion with {} failed", self.model))?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
