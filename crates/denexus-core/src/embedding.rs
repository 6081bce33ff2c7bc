//! Embedding capability used for both index build and query time.

use async_trait::async_trait;

/// Turns text into a fixed-length vector.
///
/// The same instance must embed the corpus and the queries; vectors from
/// different models are not comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded in the persisted index.
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts; one vector per input, same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("invalid embedding service URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("embedding request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
    #[error("embedding service returned an empty vector")]
    Empty,
    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding failed: {0}")]
    Other(String),
}
