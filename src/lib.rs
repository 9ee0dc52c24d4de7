pub mod cli;
pub mod config;
pub mod error;
pub mod keywords;
pub mod picker;
pub mod search;
pub mod server;

pub use error::{PickerError, Result};
pub use keywords::{KeywordExtractor, KeywordScore, KeywordScorer};
pub use picker::EmbedPicker;
pub use search::{EmbeddingDataset, EmbeddingStore, Encoder, ModelRegistry, NearestNeighborSearch, ScoredMatch};
