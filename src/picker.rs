use std::path::Path;
use std::sync::Arc;

use crate::error::{PickerError, Result};
use crate::keywords::{KeywordExtractor, KeywordScore};
use crate::search::{EmbeddingStore, ModelRegistry, NearestNeighborSearch, ScoredMatch};

/// Both engines behind one handle: dataset retrieval and keyword extraction.
/// They share nothing beyond living in the same struct.
pub struct EmbedPicker {
    store: EmbeddingStore,
    search: NearestNeighborSearch,
    keywords: KeywordExtractor,
}

impl EmbedPicker {
    pub fn new(registry: Arc<ModelRegistry>, keywords: KeywordExtractor) -> Self {
        Self {
            store: EmbeddingStore::new(Arc::clone(&registry)),
            search: NearestNeighborSearch::new(registry),
            keywords,
        }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.store.registry()
    }

    /// Loads (or reuses) the encoded dataset and returns the `n` records
    /// closest to `query`.
    pub fn nearest(
        &self,
        path: &Path,
        field: &str,
        model_name: &str,
        query: &str,
        n: usize,
    ) -> Result<Vec<ScoredMatch>> {
        // Reject before paying for a dataset load.
        if query.trim().is_empty() {
            return Err(PickerError::EmptyQuery);
        }
        let dataset = self.store.load(path, field, model_name)?;
        self.search.closest_embeddings(query, model_name, &dataset, n)
    }

    pub fn keywords(&self, text: &str) -> Vec<KeywordScore> {
        self.keywords.extract(text)
    }
}
