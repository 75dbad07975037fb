//! Constants used throughout code-query
//! This module centralizes all constant values for better maintainability

/// Environment variables holding the OpenAI credential, in lookup order
pub const API_KEY_ENV_VARS: &[&str] = &["OPEN_AI_KEY", "OPENAI_API_KEY"];

/// File name of the cached document set inside the cache directory
pub const DOCUMENTS_FILE_NAME: &str = "documents.json";

/// Index metadata file inside the vector store directory
pub const INDEX_ARGS_FILE_NAME: &str = "args.json";

/// Index entries file inside the vector store directory
pub const INDEX_ENTRIES_FILE_NAME: &str = "index.json";

/// Compiler configuration looked up from the repository path upward
pub const TSCONFIG_FILE_NAME: &str = "tsconfig.json";

/// Any enumerated path containing this marker is a vendored dependency
pub const VENDOR_MARKER: &str = "node_modules";

/// Excludes applied when a tsconfig declares no `exclude` of its own
pub const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

/// Source extensions the compiler always accepts
pub const TS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts"];

/// Extra extensions accepted with `allowJs`
pub const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".mjs", ".cjs"];

/// Maximum chunk length in characters
pub const CHUNK_SIZE: usize = 1000;

/// Characters shared between neighbouring chunks
pub const CHUNK_OVERLAP: usize = 200;

/// Split points tried in order, coarsest first; the empty string splits per character
pub const CHUNK_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Input that ends the interactive session
pub const EXIT_SENTINEL: &str = "exit";

/// Prompt printed before each question
pub const QUERY_PROMPT: &str = "\n\nPlease ask anything, type \"exit\" to close:\n\nUser: ";

/// System instruction placed before the retrieved snippets
pub const ASSISTANT_PERSONA: &str = "You're an AI. You answer questions about codebase and draw mermaid diagrams. \
The codebase has been already scanned and relevant code snippets have been prepared for you. \
This is the relevant data for the user's question: \n";

/// Instruction sent with every chunk during the summary pass
pub const SUMMARY_INSTRUCTION: &str = "You summarize source code for a search index. \
Describe in a few plain sentences what the following snippet does, naming the functions, \
classes and types it defines or uses. Do not repeat the code.";
