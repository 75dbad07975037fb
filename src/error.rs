use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions surfaced by the indexing and query pipeline.
///
/// Everything else in the crate reports through `anyhow`; these variants exist
/// so callers can tell the named failure modes apart with `downcast_ref`.
#[derive(Debug, Error)]
pub enum CodeQueryError {
    #[error("Could not find a valid tsconfig.json starting from {}", .0.display())]
    ConfigurationNotFound(PathBuf),

    #[error("Errors while parsing tsconfig {}: {message}", .path.display())]
    ConfigurationParse { path: PathBuf, message: String },

    #[error("Codebase couldn't be processed: no documents were produced from {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("Failed to build vector store ({batches_done}/{batches_total} batches embedded): {message}")]
    EmbeddingBuildFailure {
        message: String,
        batches_done: usize,
        batches_total: usize,
    },

    #[error("OpenAI API key is not set (expected OPEN_AI_KEY or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("{service} rate limited after {attempts} attempts")]
    RateLimited { service: String, attempts: u32 },

    #[error("{service} returned {status}: {body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },
}

impl CodeQueryError {
    /// Whether the error originated from the remote API after the retry budget ran out
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Api { .. })
    }
}
