use rayon::prelude::*;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::error::{PickerError, Result};
use crate::search::data_loader::DatasetRecord;
use crate::search::embedding_engine::EmbeddingVector;
use crate::search::embedding_store::EmbeddingDataset;
use crate::search::model_registry::ModelRegistry;

/// Field added to each returned record to carry its similarity. Reserved:
/// a record's own `_score` is replaced in responses.
pub const SCORE_FIELD: &str = "_score";

/// A dataset record together with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub record: DatasetRecord,
    pub score: f64,
}

impl ScoredMatch {
    /// The record's own fields, in order, followed by `_score`.
    pub fn into_json(self) -> Value {
        let mut record = self.record;
        if let Some(previous) = record.shift_remove(SCORE_FIELD) {
            tracing::warn!(%previous, "record field '{}' replaced by similarity score", SCORE_FIELD);
        }
        record.insert(SCORE_FIELD.to_string(), Value::from(self.score));
        Value::Object(record)
    }
}

/// Cosine similarity; a zero-magnitude side scores 0.
///
/// Accumulates in f64, which holds the square of any finite f32 without
/// overflow or underflow.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (f64::from(x), f64::from(y)))
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct ScoredIndex {
    pub score: f64,
    pub index: usize,
}

impl Eq for ScoredIndex {}

impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredIndex {
    // Greater means ranks lower: a smaller score, or an equal score seen later.
    // The heap top is then the weakest kept candidate, and into_sorted_vec()
    // yields best first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Exact top-`n` by cosine similarity over every vector.
pub(crate) fn rank(query: &[f32], vectors: &[EmbeddingVector], n: usize) -> Vec<ScoredIndex> {
    if n == 0 || vectors.is_empty() {
        return Vec::new();
    }

    let scores: Vec<f64> = vectors
        .par_iter()
        .map(|v| cosine_similarity(query, v))
        .collect();

    let mut heap = BinaryHeap::with_capacity(n.min(scores.len()) + 1);
    for (index, score) in scores.into_iter().enumerate() {
        heap.push(ScoredIndex { score, index });
        if heap.len() > n {
            heap.pop();
        }
    }
    heap.into_sorted_vec()
}

/// Full-scan nearest-neighbor search over an encoded dataset.
#[derive(Clone)]
pub struct NearestNeighborSearch {
    registry: Arc<ModelRegistry>,
}

impl NearestNeighborSearch {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Returns up to `n` records ranked by similarity to `query`, best first.
    /// Equal scores keep dataset order.
    pub fn closest_embeddings(
        &self,
        query: &str,
        model_name: &str,
        dataset: &EmbeddingDataset,
        n: usize,
    ) -> Result<Vec<ScoredMatch>> {
        if query.trim().is_empty() {
            return Err(PickerError::EmptyQuery);
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let encoder = self.registry.resolve(model_name)?;
        let query_vector = encoder
            .encode(query)
            .map_err(|e| PickerError::encoding(model_name, format!("{:#}", e)))?;

        if query_vector.len() != dataset.dimension() {
            return Err(PickerError::DimensionMismatch {
                model: model_name.to_string(),
                expected: dataset.dimension(),
                actual: query_vector.len(),
            });
        }
        if query_vector.iter().any(|v| !v.is_finite()) {
            return Err(PickerError::encoding(model_name, "query embedding contains NaN or infinity"));
        }
        if model_name != dataset.model_name() {
            tracing::warn!(
                query_model = model_name,
                dataset_model = dataset.model_name(),
                "querying with a different model of the same dimension"
            );
        }

        let ranked = rank(&query_vector, dataset.vectors(), n);
        tracing::debug!(
            model = model_name,
            candidates = dataset.len(),
            returned = ranked.len(),
            top_score = ranked.first().map(|s| s.score),
            "nearest-neighbor search"
        );

        Ok(ranked
            .into_iter()
            .map(|s| ScoredMatch {
                record: dataset.records()[s.index].clone(),
                score: s.score,
            })
            .collect())
    }
}
