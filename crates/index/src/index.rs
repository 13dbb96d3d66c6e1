//! The document index: corpus + embeddings + flat L2 search.

use chrono::{DateTime, Utc};
use curator_core::error::IndexError;
use curator_core::provider::Embedder;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::corpus::{Document, load_corpus};
use crate::vector::nearest_positions;

/// Separator placed between retrieved documents in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Default number of documents retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

/// A scored search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Offset of the document in the corpus
    pub position: usize,
    pub id: String,
    pub distance: f32,
}

/// An immutable nearest-neighbor index over one community's corpus.
///
/// `documents[i]` is embedded as `vectors[i]`; the two are built together and
/// never mutated, so their lengths always match.
pub struct DocumentIndex {
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
    built_at: DateTime<Utc>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("docs", &self.documents.len())
            .field("dimension", &self.dimension)
            .field("built_at", &self.built_at)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl DocumentIndex {
    /// An index with no documents. Searches return empty context.
    pub fn empty(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            documents: Vec::new(),
            vectors: Vec::new(),
            dimension: 0,
            built_at: Utc::now(),
            embedder,
        }
    }

    /// Load the corpus in `dir` and embed it.
    pub async fn build(embedder: Arc<dyn Embedder>, dir: &Path) -> Result<Self, IndexError> {
        let documents = load_corpus(dir).await?;
        let index = Self::from_documents(embedder, documents).await?;
        info!(dir = %dir.display(), docs = index.len(), "Document index built");
        Ok(index)
    }

    /// Embed an already-loaded corpus.
    pub async fn from_documents(
        embedder: Arc<dyn Embedder>,
        documents: Vec<Document>,
    ) -> Result<Self, IndexError> {
        if documents.is_empty() {
            return Ok(Self::empty(embedder));
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        if vectors.len() != documents.len() {
            return Err(IndexError::CountMismatch {
                expected: documents.len(),
                found: vectors.len(),
            });
        }

        let dimension = vectors[0].len();
        for (doc, vector) in documents.iter().zip(&vectors) {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    id: doc.id.clone(),
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }

        Ok(Self {
            documents,
            vectors,
            dimension,
            built_at: Utc::now(),
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// The `k` documents nearest to `query`, ascending by distance.
    ///
    /// The embedder is not called when the index is empty or `k == 0`.
    pub async fn nearest(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query).await?;
        if query_vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                id: "<query>".into(),
                expected: self.dimension,
                found: query_vector.len(),
            });
        }

        Ok(nearest_positions(&self.vectors, &query_vector, k)
            .into_iter()
            .map(|(position, distance)| SearchHit {
                position,
                id: self.documents[position].id.clone(),
                distance,
            })
            .collect())
    }

    /// Context for `query`: the full text of the `k` nearest documents joined
    /// by [`CONTEXT_SEPARATOR`].
    ///
    /// Never fails. An embedding error degrades to empty context.
    pub async fn search(&self, query: &str, k: usize) -> String {
        match self.nearest(query, k).await {
            Ok(hits) => {
                debug!(
                    hits = hits.len(),
                    ids = ?hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
                    "Retrieved context"
                );
                hits.iter()
                    .map(|h| self.documents[h.position].text.as_str())
                    .collect::<Vec<_>>()
                    .join(CONTEXT_SEPARATOR)
            }
            Err(e) => {
                warn!(error = %e, "Index unavailable; answering without context");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use curator_core::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as `[len, vowel count]` and counts calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs
                .iter()
                .map(|s| {
                    let vowels = s.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![s.len() as f32, vowels as f32]
                })
                .collect())
        }
    }

    /// Returns vectors of varying dimension.
    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        fn name(&self) -> &str {
            "ragged"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(inputs.iter().map(|s| vec![0.0; s.len()]).collect())
        }
    }

    struct DownEmbedder {
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Embedder for DownEmbedder {
        fn name(&self) -> &str {
            "down"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("connection refused".into()));
            }
            Ok(inputs.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn docs(texts: &[(&str, &str)]) -> Vec<Document> {
        texts.iter().map(|(id, t)| Document::new(*id, *t)).collect()
    }

    #[tokio::test]
    async fn empty_index_never_calls_embedder() {
        let embedder = CountingEmbedder::new();
        let index = DocumentIndex::from_documents(embedder.clone(), vec![]).await.unwrap();

        assert_eq!(index.search("anything", 3).await, "");
        assert!(index.nearest("anything", 3).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nearest_bounded_by_k_and_sorted() {
        let embedder = CountingEmbedder::new();
        let index = DocumentIndex::from_documents(
            embedder,
            docs(&[("a", "aaaaaaaaaa"), ("b", "bb"), ("c", "ccccc"), ("d", "d")]),
        )
        .await
        .unwrap();

        let hits = index.nearest("xx", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        assert_eq!(index.nearest("xx", 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn search_joins_in_distance_order() {
        let embedder = CountingEmbedder::new();
        let index = DocumentIndex::from_documents(
            embedder,
            docs(&[("far", "zzzzzzzzzzzzzzzzzz"), ("near", "qq"), ("mid", "qqqqqq")]),
        )
        .await
        .unwrap();

        let context = index.search("q", 2).await;
        assert_eq!(context, "qq\n\n---\n\nqqqqqq");
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_build() {
        let err = DocumentIndex::from_documents(Arc::new(RaggedEmbedder), docs(&[("a", "x"), ("b", "yy")]))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { ref id, .. } if id == "b"));
    }

    #[tokio::test]
    async fn query_embedding_failure_degrades_to_empty_context() {
        let embedder = Arc::new(DownEmbedder {
            fail: std::sync::atomic::AtomicBool::new(false),
        });
        let index = DocumentIndex::from_documents(embedder.clone(), docs(&[("a", "text")]))
            .await
            .unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        assert_eq!(index.search("q", 3).await, "");
        assert!(index.nearest("q", 3).await.is_err());
    }

    #[tokio::test]
    async fn build_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.md"), "first").unwrap();
        std::fs::write(dir.path().join("two.txt"), "second").unwrap();

        let index = DocumentIndex::build(CountingEmbedder::new(), dir.path()).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.documents()[0].id, "one.md");
    }
}
