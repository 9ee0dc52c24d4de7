use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PickerError>;

/// Failures surfaced by dataset loading, nearest-neighbor search and model resolution.
#[derive(Debug, Error)]
pub enum PickerError {
    /// No model is registered under this name.
    #[error("unknown model: '{0}'")]
    UnknownModel(String),

    #[error("dataset file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The dataset file exists but could not be decoded into records.
    #[error("failed to parse dataset {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record {index} in {} has no field '{field}'", path.display())]
    MissingField {
        path: PathBuf,
        field: String,
        index: usize,
    },

    #[error("field '{field}' of record {index} in {} is not text", path.display())]
    FieldNotText {
        path: PathBuf,
        field: String,
        index: usize,
    },

    /// Query vector and stored vectors disagree on dimensionality.
    #[error("dimension mismatch for model '{model}': dataset has {expected}, query has {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("query text is empty")]
    EmptyQuery,

    #[error("encoding with model '{model}' failed: {message}")]
    Encoding { model: String, message: String },
}

impl PickerError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PickerError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn encoding(model: &str, message: impl ToString) -> Self {
        PickerError::Encoding {
            model: model.to_string(),
            message: message.to_string(),
        }
    }
}
