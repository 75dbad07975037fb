pub mod index;
pub mod store;
pub mod r#trait;

pub use index::{IndexEntry, VectorIndex};
pub use r#trait::Retriever;
pub use store::{IndexArgs, IndexBuilder, VectorStore};
