//! Index lifecycle: load the persisted index, or embed → build → persist.

use std::path::{Path, PathBuf};

use crate::documents::Document;
use crate::embedding::{Embedder, EmbeddingError};
use crate::store::{LoadError, PersistError, VectorIndex};

/// Texts sent to the embedder per request while building.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Result of trying to reuse a persisted index.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(VectorIndex),
    /// Nothing usable on disk; the caller should rebuild.
    Recoverable(IndexLoadError),
}

/// Why a persisted index could not be used. Never fatal: it means "rebuild".
#[derive(Debug, thiserror::Error)]
pub enum IndexLoadError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("index was built with embedding model {found:?}, current model is {expected:?}")]
    ModelMismatch { expected: String, found: String },
}

/// Failure while building a fresh index. Fatal for initialization.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("could not persist index to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
}

/// Try the persisted index at `index_path`. The index is trusted as-is; only
/// its structure and embedding model are checked, not its contents against
/// the current tables.
pub fn load_index(index_path: &Path, embed_model: &str) -> LoadOutcome {
    let index = match VectorIndex::load(index_path) {
        Ok(index) => index,
        Err(e) => return LoadOutcome::Recoverable(e.into()),
    };
    if index.embed_model() != embed_model {
        return LoadOutcome::Recoverable(IndexLoadError::ModelMismatch {
            expected: embed_model.to_string(),
            found: index.embed_model().to_string(),
        });
    }
    LoadOutcome::Loaded(index)
}

/// Returns the persisted index if usable, otherwise builds, persists and returns a new one.
pub async fn get_index(
    documents: &[Document],
    embedder: &dyn Embedder,
    index_path: &Path,
) -> Result<VectorIndex, IndexError> {
    match load_index(index_path, embedder.model_name()) {
        LoadOutcome::Loaded(index) => {
            tracing::info!(
                path = %index_path.display(),
                documents = index.len(),
                "loaded persisted index"
            );
            Ok(index)
        }
        LoadOutcome::Recoverable(reason) => {
            match &reason {
                IndexLoadError::Load(LoadError::Missing(_)) => {
                    tracing::info!(path = %index_path.display(), "no persisted index, building")
                }
                other => {
                    tracing::warn!(path = %index_path.display(), "rebuilding index: {other}")
                }
            }
            rebuild_index(documents, embedder, index_path).await
        }
    }
}

/// Embed every document, build the index and persist it, ignoring any copy on disk.
/// Nothing is written if embedding fails.
pub async fn rebuild_index(
    documents: &[Document],
    embedder: &dyn Embedder,
    index_path: &Path,
) -> Result<VectorIndex, IndexError> {
    let index = build_index(documents, embedder).await?;
    let written = index.save(index_path).map_err(|source| IndexError::Persist {
        path: index_path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %written.display(),
        documents = index.len(),
        dims = index.dims(),
        "persisted index"
    );
    Ok(index)
}

/// Embed all document texts in batches and build an in-memory index.
pub async fn build_index(
    documents: &[Document],
    embedder: &dyn Embedder,
) -> Result<VectorIndex, EmbeddingError> {
    let mut index = VectorIndex::new(embedder.model_name());
    if documents.is_empty() {
        return Ok(index);
    }

    let total = documents.len();
    for batch in documents.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        index.add_batch(batch.to_vec(), embeddings)?;
        tracing::debug!(embedded = index.len(), total, "embedding documents");
    }
    Ok(index)
}
