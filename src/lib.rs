pub mod cache;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod http;
pub mod llm;
pub mod loader;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod pipeline;
pub mod project;
pub mod query;
pub mod summarizer;
pub mod utils;
pub mod vector_store;

pub use error::CodeQueryError;
pub use models::Document;
pub use pipeline::Pipeline;
pub use query::QueryLoop;
pub use vector_store::{Retriever, VectorStore};
