pub mod r#trait;
pub mod openai;

pub use openai::OpenAiChatModel;
pub use r#trait::ChatModel;
