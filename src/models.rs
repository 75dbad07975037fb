use serde::{Deserialize, Serialize};
use std::path::Path;

/// A chunk of source text, or a summary of one, tied to the file it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Metadata carried by every document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Path of the source file the document was produced from
    #[serde(rename = "sourcePath")]
    pub source_path: String,
}

impl Document {
    /// Create a new Document instance
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source_path: source_path.into(),
            },
        }
    }

    /// Create a document for a chunk read from `path`
    pub fn from_path(content: impl Into<String>, path: &Path) -> Self {
        Self::new(content, path.to_string_lossy().into_owned())
    }

    pub fn source_path(&self) -> &str {
        &self.metadata.source_path
    }

    /// True when there is nothing worth embedding
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Same source, new content: used to pair a summary with its chunk
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: self.metadata.clone(),
        }
    }

    /// Stable identifier derived from the source path and content
    pub fn id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.metadata.source_path.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.content.as_bytes());
        format!("doc_{}", &hasher.finalize().to_hex()[..32])
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_json_shape() {
        let doc = Document::new("export const a = 1;", "/repo/src/a.ts");
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["content"], "export const a = 1;");
        assert_eq!(value["metadata"]["sourcePath"], "/repo/src/a.ts");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_document_blank() {
        assert!(Document::new("  \n\t", "a.ts").is_blank());
        assert!(!Document::new("x", "a.ts").is_blank());
    }

    #[test]
    fn test_with_content_keeps_source() {
        let chunk = Document::new("function f() {}", "/repo/f.ts");
        let summary = chunk.with_content("Defines f.");
        assert_eq!(summary.source_path(), "/repo/f.ts");
        assert_eq!(summary.content, "Defines f.");
    }

    #[test]
    fn test_document_id_stable_and_distinct() {
        let a = Document::new("same", "/a.ts");
        let b = Document::new("same", "/b.ts");
        assert_eq!(a.id(), Document::new("same", "/a.ts").id());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), "doc_".len() + 32);
    }

    #[test]
    fn test_chat_message_roles_serialize_lowercase() {
        let msg = ChatMessage::system("hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(ChatMessage::user("q").role, Role::User);
    }
}
