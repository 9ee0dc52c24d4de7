use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{PickerError, Result};
use crate::search::data_loader::{field_texts, load_records, DatasetRecord};
use crate::search::embedding_engine::EmbeddingVector;
use crate::search::model_registry::ModelRegistry;

/// Identity of one encoded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
    pub path: PathBuf,
    pub field: String,
    pub model_name: String,
}

impl DatasetKey {
    pub fn new(path: impl Into<PathBuf>, field: &str, model_name: &str) -> Self {
        Self {
            path: path.into(),
            field: field.to_string(),
            model_name: model_name.to_string(),
        }
    }
}

/// Records of a dataset file paired with the embedding of their text field.
#[derive(Debug)]
pub struct EmbeddingDataset {
    key: DatasetKey,
    records: Vec<DatasetRecord>,
    vectors: Vec<EmbeddingVector>,
    dimension: usize,
}

impl EmbeddingDataset {
    /// Checks that every record has exactly one finite vector of `dimension` components.
    pub fn new(
        key: DatasetKey,
        records: Vec<DatasetRecord>,
        vectors: Vec<EmbeddingVector>,
        dimension: usize,
    ) -> Result<Self> {
        if records.len() != vectors.len() {
            return Err(PickerError::encoding(
                &key.model_name,
                format!("{} records but {} embeddings", records.len(), vectors.len()),
            ));
        }
        for (idx, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(PickerError::encoding(
                    &key.model_name,
                    format!(
                        "embedding {} has dimension {}, expected {}",
                        idx,
                        vector.len(),
                        dimension
                    ),
                ));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(PickerError::encoding(
                    &key.model_name,
                    format!("embedding {} contains NaN or infinity", idx),
                ));
            }
        }
        Ok(Self {
            key,
            records,
            vectors,
            dimension,
        })
    }

    pub fn key(&self) -> &DatasetKey {
        &self.key
    }

    pub fn model_name(&self) -> &str {
        &self.key.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn vectors(&self) -> &[EmbeddingVector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatasetRecord, &EmbeddingVector)> {
        self.records.iter().zip(self.vectors.iter())
    }
}

type Slot = Arc<OnceCell<Arc<EmbeddingDataset>>>;

enum BuildError {
    Failed(PickerError),
    /// The slot was dropped from the map while this caller waited on it.
    Superseded,
}

/// Process-wide cache of encoded datasets.
///
/// Each key owns a once-cell: the first caller to miss builds the dataset
/// while concurrent callers for the same key wait on that cell. A failed
/// build removes its slot before releasing the cell, and the waiters retry
/// against whichever slot the map holds next. Callers for other keys only
/// touch the map long enough to clone their slot.
pub struct EmbeddingStore {
    registry: Arc<ModelRegistry>,
    cache: DashMap<DatasetKey, Slot>,
}

impl EmbeddingStore {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn load(
        &self,
        path: impl AsRef<Path>,
        field: &str,
        model_name: &str,
    ) -> Result<Arc<EmbeddingDataset>> {
        self.load_key(&DatasetKey::new(path.as_ref(), field, model_name))
    }

    pub fn load_key(&self, key: &DatasetKey) -> Result<Arc<EmbeddingDataset>> {
        loop {
            let slot = self.slot(key);
            if let Some(dataset) = slot.get() {
                tracing::debug!(path = %key.path.display(), field = %key.field, model = %key.model_name, "dataset cache hit");
                return Ok(Arc::clone(dataset));
            }

            let outcome = slot.get_or_try_init(|| {
                // A waiter inherits the cell after a failed build; by then the
                // slot has left the map and the key lives in a fresh one.
                if !self.holds(key, &slot) {
                    return Err(BuildError::Superseded);
                }
                self.build(key).map(Arc::new).map_err(|e| {
                    // Still inside the cell's init, so waiters cannot build here.
                    self.cache.remove_if(key, |_, s| Arc::ptr_eq(s, &slot));
                    BuildError::Failed(e)
                })
            });

            match outcome {
                Ok(dataset) => return Ok(Arc::clone(dataset)),
                Err(BuildError::Failed(e)) => return Err(e),
                Err(BuildError::Superseded) => continue,
            }
        }
    }

    /// Rebuilds the dataset for `key` and swaps it in whole.
    pub fn reload(
        &self,
        path: impl AsRef<Path>,
        field: &str,
        model_name: &str,
    ) -> Result<Arc<EmbeddingDataset>> {
        let key = DatasetKey::new(path.as_ref(), field, model_name);
        let dataset = Arc::new(self.build(&key)?);
        self.cache
            .insert(key, Arc::new(OnceCell::with_value(Arc::clone(&dataset))));
        Ok(dataset)
    }

    pub fn contains(&self, key: &DatasetKey) -> bool {
        self.cache
            .get(key)
            .map(|slot| slot.get().is_some())
            .unwrap_or(false)
    }

    pub fn evict(&self, key: &DatasetKey) -> bool {
        self.cache.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of fully built datasets.
    pub fn len(&self) -> usize {
        self.cache.iter().filter(|e| e.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn holds(&self, key: &DatasetKey, slot: &Slot) -> bool {
        self.cache
            .get(key)
            .map(|current| Arc::ptr_eq(current.value(), slot))
            .unwrap_or(false)
    }

    fn slot(&self, key: &DatasetKey) -> Slot {
        if let Some(slot) = self.cache.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.cache.entry(key.clone()).or_default().value())
    }

    fn build(&self, key: &DatasetKey) -> Result<EmbeddingDataset> {
        let started = Instant::now();
        let encoder = self.registry.resolve(&key.model_name)?;
        let records = load_records(&key.path)?;
        let texts = field_texts(&key.path, &records, &key.field)?;

        let vectors = encoder
            .encode_batch(&texts)
            .map_err(|e| PickerError::encoding(&key.model_name, format!("{:#}", e)))?;

        let dataset = EmbeddingDataset::new(key.clone(), records, vectors, encoder.dimension())?;

        let zero_vectors = dataset
            .vectors()
            .iter()
            .filter(|v| v.iter().all(|&x| x == 0.0))
            .count();
        if zero_vectors > 0 {
            tracing::warn!(
                path = %key.path.display(),
                zero_vectors,
                "all-zero embeddings will score 0 against every query"
            );
        }

        tracing::info!(
            path = %key.path.display(),
            field = %key.field,
            model = %key.model_name,
            records = dataset.len(),
            dimension = dataset.dimension(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "encoded dataset"
        );
        Ok(dataset)
    }
}
