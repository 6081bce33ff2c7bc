//! Ollama client for embeddings. Wraps ollama-rs behind the [`Embedder`] trait.

use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;

use crate::embedding::{Embedder, EmbeddingError};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    inner: Ollama,
    embed_model: String,
}

impl OllamaEmbedder {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, EmbeddingError> {
        let inner = Ollama::try_new(url)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self.inner.generate_embeddings(req).await?;
        match res.embeddings.into_iter().next() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(EmbeddingError::Empty),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self.inner.generate_embeddings(req).await?;
        if res.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: res.embeddings.len(),
            });
        }
        Ok(res.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_model_override() {
        let e = OllamaEmbedder::from_url(DEFAULT_BASE_URL).unwrap();
        assert_eq!(e.model_name(), DEFAULT_EMBED_MODEL);
        let e = e.with_embed_model("all-minilm");
        assert_eq!(e.model_name(), "all-minilm");
    }

    #[test]
    fn bad_url_is_rejected() {
        assert!(matches!(
            OllamaEmbedder::from_url("not a url"),
            Err(EmbeddingError::ParseUrl(_))
        ));
    }
}
