pub mod data_loader;
pub mod embedding_engine;
pub mod embedding_store;
pub mod model_registry;
pub mod nearest;

pub use data_loader::{load_records, DatasetFormat, DatasetRecord};
pub use embedding_engine::{EmbeddingVector, Encoder, HashingEncoder, StaticModelEncoder};
pub use embedding_store::{DatasetKey, EmbeddingDataset, EmbeddingStore};
pub use model_registry::{default_model_specs, ModelRegistry, ModelSpec};
pub use nearest::{cosine_similarity, NearestNeighborSearch, ScoredMatch, SCORE_FIELD};
