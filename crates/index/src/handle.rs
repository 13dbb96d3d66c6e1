//! Shared, atomically replaceable index.

use curator_core::error::IndexError;
use curator_core::provider::Embedder;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::index::DocumentIndex;

/// Process-wide handle to the current [`DocumentIndex`].
///
/// Readers take an `Arc` snapshot and search it without holding any lock.
/// A rebuild constructs the replacement completely before swapping the
/// pointer, so readers see either the old index or the new one.
pub struct IndexHandle {
    current: RwLock<Arc<DocumentIndex>>,
    embedder: Arc<dyn Embedder>,
    corpus_dir: PathBuf,
}

impl IndexHandle {
    /// Build the initial index from `corpus_dir`.
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        corpus_dir: impl Into<PathBuf>,
    ) -> Result<Self, IndexError> {
        let corpus_dir = corpus_dir.into();
        let index = DocumentIndex::build(embedder.clone(), &corpus_dir).await?;
        Ok(Self {
            current: RwLock::new(Arc::new(index)),
            embedder,
            corpus_dir,
        })
    }

    /// Wrap an already-built index.
    pub fn new(index: DocumentIndex, embedder: Arc<dyn Embedder>, corpus_dir: PathBuf) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
            embedder,
            corpus_dir,
        }
    }

    pub fn corpus_dir(&self) -> &Path {
        &self.corpus_dir
    }

    /// The index as of now.
    pub fn snapshot(&self) -> Arc<DocumentIndex> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the current index, returning the previous one.
    pub fn swap(&self, index: DocumentIndex) -> Arc<DocumentIndex> {
        let next = Arc::new(index);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    /// Re-read the corpus directory and swap in the new index.
    ///
    /// On failure the current index stays in place.
    pub async fn rebuild(&self) -> Result<usize, IndexError> {
        let index = DocumentIndex::build(self.embedder.clone(), &self.corpus_dir).await?;
        let docs = index.len();
        let previous = self.swap(index);
        info!(
            docs,
            previous_docs = previous.len(),
            dir = %self.corpus_dir.display(),
            "Index rebuilt"
        );
        Ok(docs)
    }
}
