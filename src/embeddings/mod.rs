pub mod r#trait;
pub mod openai;

pub use openai::OpenAiEmbeddingProvider;
pub use r#trait::EmbeddingProvider;
