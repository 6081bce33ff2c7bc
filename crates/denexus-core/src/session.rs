//! The chat session: one-time corpus + index initialization, then
//! retrieve-and-generate per query.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::completion::{CompletionClient, CompletionError, GroqClient};
use crate::config::Config;
use crate::documents::{load_documents, DataLoadError};
use crate::embedding::{Embedder, EmbeddingError};
use crate::generator::Generator;
use crate::index::{get_index, IndexError};
use crate::ollama::OllamaEmbedder;
use crate::retrieve::retrieve;
use crate::schema::SourceSchema;
use crate::store::VectorIndex;

/// What a session needs to find its corpus and index.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub sources: Vec<SourceSchema>,
    pub data_dir: PathBuf,
    pub index_path: PathBuf,
    pub top_k: usize,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            sources: config.sources.clone(),
            data_dir: config.data_dir.clone(),
            index_path: config.index_path.clone(),
            top_k: config.top_k,
        }
    }
}

/// An answer together with the passages it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub context: Vec<String>,
}

/// Holds the embedder and, once ready, the index for the lifetime of a chat.
///
/// The session starts uninitialized; the first call to [`initialize`](Self::initialize)
/// or [`answer`](Self::answer) loads the tables and loads or builds the index.
/// Concurrent callers wait for that single initialization. A failed
/// initialization leaves the session uninitialized.
pub struct ChatSession {
    settings: SessionSettings,
    embedder: Arc<dyn Embedder>,
    generator: Generator,
    index: OnceCell<VectorIndex>,
}

impl ChatSession {
    pub fn new(
        settings: SessionSettings,
        embedder: Arc<dyn Embedder>,
        generator: Generator,
    ) -> Self {
        Self {
            settings,
            embedder,
            generator,
            index: OnceCell::new(),
        }
    }

    /// Wires the Ollama embedder and the Groq completion client from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let embedder = OllamaEmbedder::from_url(&config.ollama_url)
            .map_err(|e| ChatError::Init(InitError::Embedder(e)))?
            .with_embed_model(config.model_name.clone());
        let client = GroqClient::new(
            &config.completion_url,
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let client: Arc<dyn CompletionClient> = Arc::new(client);
        Ok(Self::new(
            SessionSettings::from(config),
            Arc::new(embedder),
            Generator::new(client, config.completion_model.clone()),
        ))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Completion model the answers come from.
    pub fn completion_model(&self) -> &str {
        self.generator.model()
    }

    pub fn embed_model(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn is_ready(&self) -> bool {
        self.index.initialized()
    }

    /// The index, if initialization has completed.
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.get()
    }

    /// Load the corpus and load or build the index. Runs at most once successfully.
    pub async fn initialize(&self) -> Result<&VectorIndex, ChatError> {
        self.index
            .get_or_try_init(|| async {
                let documents = load_documents(&self.settings.sources, &self.settings.data_dir)
                    .map_err(InitError::Data)?;
                tracing::info!(
                    documents = documents.len(),
                    sources = self.settings.sources.len(),
                    "corpus loaded"
                );
                let index = get_index(
                    &documents,
                    self.embedder.as_ref(),
                    &self.settings.index_path,
                )
                .await
                .map_err(InitError::Index)?;
                Ok::<_, InitError>(index)
            })
            .await
            .map_err(ChatError::Init)
    }

    /// Answer `query` from the retrieved context.
    pub async fn answer(&self, query: &str) -> Result<String, ChatError> {
        Ok(self.answer_with_context(query).await?.text)
    }

    /// Like [`answer`](Self::answer), also returning the passages sent to the model.
    pub async fn answer_with_context(&self, query: &str) -> Result<Answer, ChatError> {
        let index = self.initialize().await?;
        let context = retrieve(query, index, self.embedder.as_ref(), self.settings.top_k)
            .await
            .inspect_err(|e| tracing::warn!("query embedding failed: {e}"))?;
        let text = self
            .generator
            .answer(query, &context)
            .await
            .inspect_err(|e| tracing::warn!("completion failed: {e}"))?;
        Ok(Answer { text, context })
    }
}

/// Why the session could not become ready.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("data load error: {0}")]
    Data(#[from] DataLoadError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("embedder setup failed: {0}")]
    Embedder(EmbeddingError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("initialization failed: {0}")]
    Init(#[from] InitError),
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}
