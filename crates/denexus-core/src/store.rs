//! Vector index over documents: exact cosine search plus the on-disk form.
//!
//! Embeddings are normalized to unit length on insert, so cosine similarity
//! is a plain dot product. The index is immutable once built.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::documents::Document;
use crate::embedding::EmbeddingError;

/// File name of the serialized index inside `index_path`.
pub const INDEX_FILENAME: &str = "index.json";

/// Bumped whenever [`PersistedIndex`] changes shape.
pub const FORMAT_VERSION: u32 = 1;

/// A document with its embedding, stored for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document: Document,
    /// Unit-length embedding.
    vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    embed_model: String,
    dims: usize,
    items: Vec<IndexedDocument>,
}

impl VectorIndex {
    pub fn new(embed_model: impl Into<String>) -> Self {
        Self {
            embed_model: embed_model.into(),
            dims: 0,
            items: Vec::new(),
        }
    }

    /// Add a document with its embedding. The first insert fixes the dimensionality.
    pub fn add(&mut self, document: Document, embedding: Vec<f32>) -> Result<(), EmbeddingError> {
        if embedding.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if self.items.is_empty() {
            self.dims = embedding.len();
        } else if embedding.len() != self.dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dims,
                actual: embedding.len(),
            });
        }
        self.items.push(IndexedDocument {
            document,
            vector: into_unit(embedding),
        });
        Ok(())
    }

    /// Add documents with embeddings in one batch.
    pub fn add_batch(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), EmbeddingError> {
        if documents.len() != embeddings.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: documents.len(),
                actual: embeddings.len(),
            });
        }
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            self.add(document, embedding)?;
        }
        Ok(())
    }

    /// Up to `k` documents most similar to the query embedding, highest first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<(&Document, f32)> {
        if self.items.is_empty() || query_embedding.is_empty() || k == 0 {
            return Vec::new();
        }
        let q_norm = into_unit(query_embedding.to_vec());
        let mut scored: Vec<(&Document, f32)> = self
            .items
            .iter()
            .map(|item| (&item.document, dot(&q_norm, &item.vector)))
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Embedding dimensionality; 0 while empty.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.items.iter().map(|i| &i.document)
    }

    /// Write the index to `<dir>/index.json`.
    ///
    /// The file is written next to its target and renamed into place, so a
    /// concurrent reader sees either the old file or the new one. With two
    /// concurrent writers the last rename wins.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, PersistError> {
        std::fs::create_dir_all(dir).map_err(PersistError::Io)?;
        let target = dir.join(INDEX_FILENAME);
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(PersistError::Io)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &PersistedIndexRef::from(self))
                .map_err(PersistError::Serialize)?;
            writer.flush().map_err(PersistError::Io)?;
        }
        tmp.as_file().sync_all().map_err(PersistError::Io)?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Read `<dir>/index.json` and check it is structurally sound.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        let path = dir.join(INDEX_FILENAME);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::Missing(path.clone()),
            _ => LoadError::Io(e),
        })?;
        let persisted: PersistedIndex =
            serde_json::from_reader(BufReader::new(file)).map_err(LoadError::Deserialize)?;
        persisted.into_index()
    }
}

/// On-disk shape of a [`VectorIndex`].
#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    embed_model: String,
    dims: usize,
    entries: Vec<IndexedDocument>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    embed_model: &'a str,
    dims: usize,
    entries: &'a [IndexedDocument],
}

impl<'a> From<&'a VectorIndex> for PersistedIndexRef<'a> {
    fn from(index: &'a VectorIndex) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            embed_model: &index.embed_model,
            dims: index.dims,
            entries: &index.items,
        }
    }
}

impl PersistedIndex {
    fn into_index(self) -> Result<VectorIndex, LoadError> {
        if self.format_version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(self.format_version));
        }
        if self.entries.is_empty() != (self.dims == 0) {
            return Err(LoadError::Corrupt(format!(
                "{} entries with dims {}",
                self.entries.len(),
                self.dims
            )));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.vector.len() != self.dims {
                return Err(LoadError::Corrupt(format!(
                    "entry {} has {} dimensions, expected {}",
                    i,
                    entry.vector.len(),
                    self.dims
                )));
            }
            if entry.document.text.is_empty() {
                return Err(LoadError::Corrupt(format!("entry {i} has empty text")));
            }
        }
        // Vectors were normalized before they were written.
        Ok(VectorIndex {
            embed_model: self.embed_model,
            dims: self.dims,
            items: self.entries,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write index: {0}")]
    Io(std::io::Error),
    #[error("failed to serialize index: {0}")]
    Serialize(serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no index at {0}")]
    Missing(PathBuf),
    #[error("failed to read index: {0}")]
    Io(std::io::Error),
    #[error("failed to parse index: {0}")]
    Deserialize(serde_json::Error),
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt index: {0}")]
    Corrupt(String),
}

/// Scales `v` to unit length in place. Zero vectors are left as they are.
fn into_unit(mut v: Vec<f32>) -> Vec<f32> {
    let len = dot(&v, &v).sqrt();
    if len > 0.0 {
        v.iter_mut().for_each(|x| *x /= len);
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentId;

    fn doc(text: &str, row: usize) -> Document {
        Document::new(text, "TEST", DocumentId::Row(row))
    }

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new("mock");
        index
            .add_batch(
                vec![doc("north", 0), doc("east", 1), doc("north-east", 2)],
                vec![vec![0.0, 2.0], vec![3.0, 0.0], vec![1.0, 1.0]],
            )
            .unwrap();
        index
    }

    #[test]
    fn search_orders_by_cosine() {
        let index = sample();
        let hits = index.search(&[0.0, 1.0], 3);
        let texts: Vec<_> = hits.iter().map(|(d, _)| d.text.as_str()).collect();
        assert_eq!(texts, ["north", "north-east", "east"]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_respects_k() {
        let index = sample();
        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 3);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new("mock");
        index
            .add_batch(
                vec![doc("a", 0), doc("b", 1), doc("c", 2)],
                vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![0.5, 0.0]],
            )
            .unwrap();
        let texts: Vec<_> = index
            .search(&[1.0, 0.0], 3)
            .into_iter()
            .map(|(d, _)| d.text.clone())
            .collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[test]
    fn zero_vectors_do_not_poison_scores() {
        let mut index = VectorIndex::new("mock");
        index.add(doc("blank", 0), vec![0.0, 0.0]).unwrap();
        index.add(doc("east", 1), vec![4.0, 0.0]).unwrap();
        let hits = index.search(&[2.0, 0.0], 2);
        assert_eq!(hits[0].0.text, "east");
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].1, 0.0);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new("mock");
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
        assert_eq!(index.dims(), 0);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let mut index = VectorIndex::new("mock");
        index.add(doc("a", 0), vec![1.0, 0.0]).unwrap();
        let err = index.add(doc("b", 1), vec![1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn save_then_load_gives_same_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample();
        let path = index.save(dir.path()).unwrap();
        assert!(path.ends_with(INDEX_FILENAME));

        let loaded = VectorIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.embed_model(), "mock");
        assert_eq!(loaded.len(), 3);
        let query = [0.3, 0.9];
        let before = index.search(&query, 2);
        let after = loaded.search(&query, 2);
        assert_eq!(before.len(), after.len());
        for ((d1, s1), (d2, s2)) in before.iter().zip(&after) {
            assert_eq!(d1, d2);
            assert!((s1 - s2).abs() < 1e-6);
        }
    }

    #[test]
    fn load_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(VectorIndex::load(dir.path()), Err(LoadError::Missing(_))));

        std::fs::write(dir.path().join(INDEX_FILENAME), "{not json").unwrap();
        assert!(matches!(VectorIndex::load(dir.path()), Err(LoadError::Deserialize(_))));
    }

    #[test]
    fn load_rejects_inconsistent_dims() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "format_version": FORMAT_VERSION,
            "embed_model": "mock",
            "dims": 3,
            "entries": [{
                "document": { "text": "a", "source": "TEST", "id": 0 },
                "vector": [1.0, 0.0]
            }]
        });
        std::fs::write(dir.path().join(INDEX_FILENAME), body.to_string()).unwrap();
        assert!(matches!(VectorIndex::load(dir.path()), Err(LoadError::Corrupt(_))));
    }
}
