//! All backend logic independent of how the assistant is presented.
//!
//! Incident-report tables are normalized into documents, embedded into a
//! persisted vector index, and searched per question to ground an LLM answer.
//! [`ChatSession`] is the entry point.

pub mod app_data;
pub mod completion;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod generator;
pub mod index;
pub mod ollama;
pub mod retrieve;
pub mod schema;
pub mod session;
pub mod store;

pub use app_data::app_data_dir;
pub use completion::{ChatMessage, CompletionClient, CompletionError, GroqClient, Role};
pub use config::{config_path, load_config_file, save_config, Config, ConfigError};
pub use documents::{load_documents, scan_tables, DataLoadError, Document, DocumentId, TableFile};
pub use embedding::{Embedder, EmbeddingError};
pub use generator::{Generator, DEFAULT_INSTRUCTIONS};
pub use index::{get_index, load_index, rebuild_index, IndexError, IndexLoadError, LoadOutcome};
pub use ollama::OllamaEmbedder;
pub use retrieve::retrieve;
pub use schema::{default_sources, SourceSchema};
pub use session::{Answer, ChatError, ChatSession, InitError, SessionSettings};
pub use store::VectorIndex;

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "denexus-core ready"
}
