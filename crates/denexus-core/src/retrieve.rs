//! Query-time context retrieval.

use crate::embedding::{Embedder, EmbeddingError};
use crate::store::VectorIndex;

/// The `k` document texts most similar to `query`, most relevant first.
///
/// `embedder` must be the one the index was built with. An empty index (or
/// `k == 0`) yields no context and makes no embedding call.
pub async fn retrieve(
    query: &str,
    index: &VectorIndex,
    embedder: &dyn Embedder,
    k: usize,
) -> Result<Vec<String>, EmbeddingError> {
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query_embedding = embedder.embed(query).await?;
    if query_embedding.len() != index.dims() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: index.dims(),
            actual: query_embedding.len(),
        });
    }
    Ok(index
        .search(&query_embedding, k)
        .into_iter()
        .map(|(doc, _)| doc.text.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Document, DocumentId};
    use async_trait::async_trait;

    struct Fixed(Vec<f32>);

    #[async_trait]
    impl Embedder for Fixed {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Embedder for Failing {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Other("offline".into()))
        }
    }

    fn index() -> VectorIndex {
        let mut index = VectorIndex::new("fixed");
        for (i, v) in [[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]].iter().enumerate() {
            index
                .add(
                    Document::new(format!("doc{i}"), "TEST", DocumentId::Row(i)),
                    v.to_vec(),
                )
                .unwrap();
        }
        index
    }

    #[tokio::test]
    async fn returns_texts_in_relevance_order() {
        let got = retrieve("q", &index(), &Fixed(vec![1.0, 0.1]), 2)
            .await
            .unwrap();
        assert_eq!(got, ["doc0", "doc2"]);
    }

    #[tokio::test]
    async fn is_deterministic() {
        let idx = index();
        let e = Fixed(vec![0.2, 0.9]);
        let a = retrieve("q", &idx, &e, 3).await.unwrap();
        let b = retrieve("q", &idx, &e, 3).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_index_skips_embedding() {
        let empty = VectorIndex::new("failing");
        assert!(retrieve("q", &empty, &Failing, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        assert!(matches!(
            retrieve("q", &index(), &Failing, 5).await,
            Err(EmbeddingError::Other(_))
        ));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        assert!(matches!(
            retrieve("q", &index(), &Fixed(vec![1.0, 0.0, 0.0]), 1).await,
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
