use crate::constants::{API_KEY_ENV_VARS, DOCUMENTS_FILE_NAME};
use crate::error::CodeQueryError;
use crate::http::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_chat_model")]
    pub summary_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Sampling temperature for answers; `None` leaves the API default
    #[serde(default)]
    pub chat_temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            summary_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            chat_temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Locations of persisted state, relative to the working directory unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_vector_store_dir")]
    pub vector_store_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_error_file")]
    pub error_file: PathBuf,
}

fn default_vector_store_dir() -> PathBuf {
    PathBuf::from("vector-store")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_error_file() -> PathBuf {
    PathBuf::from("error.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vector_store_dir: default_vector_store_dir(),
            cache_dir: default_cache_dir(),
            error_file: default_error_file(),
        }
    }
}

impl PathsConfig {
    /// Full path of the cached document set
    pub fn documents_file(&self) -> PathBuf {
        self.cache_dir.join(DOCUMENTS_FILE_NAME)
    }

    /// Anchor every relative path under `base`
    pub fn rooted_at(&self, base: &Path) -> Self {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        Self {
            vector_store_dir: anchor(&self.vector_store_dir),
            cache_dir: anchor(&self.cache_dir),
            error_file: anchor(&self.error_file),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum summary requests in flight at once
    #[serde(default = "default_summary_concurrency")]
    pub concurrency: usize,
}

fn default_true() -> bool {
    true
}

fn default_summary_concurrency() -> usize {
    3
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_summary_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Embedding batches sent concurrently
    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,
}

fn default_batch_size() -> usize {
    5
}

fn default_embedding_concurrency() -> usize {
    4
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_embedding_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from default location or return defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            "config/settings.toml",
            "./config/settings.toml",
            "~/.config/code-query/settings.toml",
        ];

        for raw in default_paths {
            let path = PathBuf::from(shellexpand::tilde(raw).as_ref());
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading settings");
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Reject settings that would stall or break the pipeline
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.retry.max_attempts == 0, "retry.max_attempts must be at least 1"),
            (self.summarizer.concurrency == 0, "summarizer.concurrency must be at least 1"),
            (self.embeddings.batch_size == 0, "embeddings.batch_size must be at least 1"),
            (self.embeddings.concurrency == 0, "embeddings.concurrency must be at least 1"),
            (self.query.top_k == 0, "query.top_k must be at least 1"),
            (self.openai.base_url.trim().is_empty(), "openai.base_url must not be empty"),
        ];

        for (failed, message) in checks {
            if failed {
                return Err(CodeQueryError::InvalidSettings(message.to_string()).into());
            }
        }
        Ok(())
    }
}

/// Read the API credential from the process environment
pub fn api_key_from_env() -> Result<String> {
    api_key_from(|name| std::env::var(name).ok())
}

/// Resolve the API credential through `lookup`, trying each known variable in order
pub fn api_key_from<F>(lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| CodeQueryError::MissingApiKey.into())
}
